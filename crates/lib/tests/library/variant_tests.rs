use archsplit_lib::{
  Capabilities, DependencyTag, ImageVariation, InstallLocation, ModuleDecl, MultilibProperties, VariantError,
  decode_multilib,
};
use archsplit_platform::{ArchType, OsType};

use super::common::{arch_names, cc_module, device_engine, engine, os_names};

#[test]
fn first_builds_only_the_primary_device_arch() {
  let engine = device_engine();
  let graph = engine.run(vec![cc_module("libfoo", Capabilities::default())]).unwrap();

  assert_eq!(os_names(&graph, "libfoo"), vec!["android"]);
  assert_eq!(arch_names(&graph, "libfoo"), vec!["arm64"]);

  let variant = graph.variant("libfoo", &[("os", "android"), ("arch", "arm64")]).unwrap();
  assert!(variant.is_primary());
  assert!(variant.arch_ready());
  assert_eq!(variant.target().unwrap().arch_type(), ArchType::Arm64);
  assert!(graph.check().is_ok());
}

#[test]
fn both_builds_every_device_arch_primary_first() {
  let engine = device_engine();
  let graph = engine
    .run(vec![cc_module("libfoo", Capabilities::default()).compile_multilib("both")])
    .unwrap();

  assert_eq!(arch_names(&graph, "libfoo"), vec!["arm64", "arm"]);
  let variants = graph.variants("libfoo");
  assert!(variants[0].is_primary());
  assert!(!variants[1].is_primary());
}

#[test]
fn host_and_device_module_gets_one_os_variant_per_class() {
  let engine = device_engine();
  let graph = engine
    .run(vec![cc_module("libfoo", Capabilities::host_and_device()).compile_multilib("both")])
    .unwrap();

  assert_eq!(
    graph
      .variants("libfoo")
      .iter()
      .map(|m| m.variations_string())
      .collect::<Vec<_>>(),
    vec![
      "os:linux_glibc,arch:x86_64",
      "os:linux_glibc,arch:x86",
      "os:android,arch:arm64",
      "os:android,arch:arm",
    ]
  );
}

#[test]
fn common_os_variant_is_last_and_depends_forward() {
  let engine = engine(
    OsType::Linux,
    r#"{"HostArch": "x86_64", "CrossHost": "windows", "CrossHostArch": "x86", "CrossHostSecondaryArch": "x86_64"}"#,
  );
  let caps = Capabilities {
    create_common_os_variant: true,
    ..Capabilities::host_only()
  };
  let graph = engine.run(vec![cc_module("sdk", caps)]).unwrap();

  assert_eq!(os_names(&graph, "sdk"), vec!["linux_glibc", "windows", "common_os"]);
  // Windows prefers 32-bit.
  assert_eq!(arch_names(&graph, "sdk"), vec!["x86_64", "x86", ""]);

  let indices = graph.variant_indices("sdk");
  let common = *indices.last().unwrap();
  let deps = graph.dependencies(common);
  assert_eq!(deps.len(), 2);
  for (to, tag) in deps {
    assert!(to < common);
    assert_eq!(tag, &DependencyTag::CommonOsToOsSpecific);
  }

  let common_variant = graph.module(common);
  assert_eq!(common_variant.os(), Some(OsType::CommonOs));
  assert_eq!(common_variant.target().unwrap().arch_type(), ArchType::Common);
  assert!(common_variant.is_primary());
  assert!(graph.check().is_ok());
}

#[test]
fn common_os_variant_alone_is_still_created() {
  let engine = device_engine();
  let caps = Capabilities {
    host_supported: false,
    device_supported: false,
    create_common_os_variant: true,
    ..Capabilities::default()
  };
  let graph = engine.run(vec![cc_module("sdk", caps)]).unwrap();
  assert_eq!(os_names(&graph, "sdk"), vec!["common_os"]);
  assert!(graph.dependencies(graph.variant_indices("sdk")[0]).is_empty());
}

#[test]
fn unsupported_everywhere_disables_module() {
  let engine = engine(OsType::Linux, r#"{"HostArch": "x86_64"}"#);
  let graph = engine.run(vec![cc_module("libfoo", Capabilities::default())]).unwrap();

  let variants = graph.variants("libfoo");
  assert_eq!(variants.len(), 1);
  assert!(!variants[0].enabled());
  assert_eq!(variants[0].variations_string(), "");
  assert!(graph.check().is_ok());
}

#[test]
fn not_arch_specific_module_is_not_split() {
  let engine = device_engine();
  let graph = engine
    .run(vec![cc_module("notice", Capabilities::not_arch_specific())])
    .unwrap();
  let variants = graph.variants("notice");
  assert_eq!(variants.len(), 1);
  assert!(variants[0].enabled());
  assert_eq!(variants[0].os(), None);
  assert_eq!(variants[0].target(), None);
}

#[test]
fn windows_variants_are_disabled_by_default() {
  let engine = engine(
    OsType::Linux,
    r#"{"HostArch": "x86_64", "CrossHost": "windows", "CrossHostArch": "x86"}"#,
  );
  let graph = engine.run(vec![cc_module("tool", Capabilities::host_only())]).unwrap();

  let linux = graph.variant("tool", &[("os", "linux_glibc"), ("arch", "x86_64")]).unwrap();
  let windows = graph.variant("tool", &[("os", "windows"), ("arch", "x86")]).unwrap();
  assert!(linux.enabled());
  assert!(!windows.enabled());
  assert!(windows.target().unwrap().host_cross);
}

#[test]
fn host_cross_targets_dropped_when_unsupported() {
  let engine = engine(
    OsType::Linux,
    r#"{"HostArch": "x86_64", "CrossHost": "linux_glibc", "CrossHostArch": "arm64"}"#,
  );

  let graph = engine.run(vec![cc_module("tool", Capabilities::host_only())]).unwrap();
  // "first" picks one target per cross flag.
  assert_eq!(arch_names(&graph, "tool"), vec!["x86_64", "arm64"]);

  let caps = Capabilities {
    host_cross_supported: false,
    ..Capabilities::host_only()
  };
  let graph = engine.run(vec![cc_module("tool", caps).compile_multilib("64")]).unwrap();
  assert_eq!(arch_names(&graph, "tool"), vec!["x86_64"]);
}

#[test]
fn native_bridge_targets_need_support() {
  let engine = engine(
    OsType::Linux,
    r#"{"HostArch": "x86_64", "DeviceArch": "x86_64", "NativeBridgeArch": "arm64", "NativeBridgeRelativePath": "arm64"}"#,
  );

  let graph = engine
    .run(vec![cc_module("libfoo", Capabilities::default()).compile_multilib("64")])
    .unwrap();
  assert_eq!(arch_names(&graph, "libfoo"), vec!["x86_64"]);

  let caps = Capabilities {
    native_bridge_supported: true,
    ..Capabilities::default()
  };
  let graph = engine
    .run(vec![cc_module("libfoo", caps.clone()).compile_multilib("64")])
    .unwrap();
  assert_eq!(arch_names(&graph, "libfoo"), vec!["x86_64", "native_bridge_arm64"]);
  let bridged = graph.variant("libfoo", &[("os", "android"), ("arch", "native_bridge_arm64")]).unwrap();
  assert!(bridged.target().unwrap().native_bridge);

  // Only the core image gets bridged variants.
  let vendor = Capabilities {
    image_variation: ImageVariation::Vendor,
    ..caps
  };
  let graph = engine
    .run(vec![cc_module("libfoo", vendor).compile_multilib("64")])
    .unwrap();
  assert_eq!(arch_names(&graph, "libfoo"), vec!["x86_64"]);
}

#[test]
fn ramdisk_modules_get_only_the_primary_arch() {
  let engine = device_engine();
  let caps = Capabilities {
    install_location: InstallLocation::VendorRamdisk,
    ..Capabilities::default()
  };
  let graph = engine
    .run(vec![cc_module("init", caps).compile_multilib("both")])
    .unwrap();
  assert_eq!(arch_names(&graph, "init"), vec!["arm64"]);
}

#[test]
fn recovery_image_keeps_only_primary_device_arch() {
  let engine = device_engine();
  let caps = Capabilities {
    image_variation: ImageVariation::Recovery,
    ..Capabilities::default()
  };

  let graph = engine
    .run(vec![cc_module("librecovery", caps.clone()).compile_multilib("both")])
    .unwrap();
  assert_eq!(arch_names(&graph, "librecovery"), vec!["arm64"]);

  let graph = engine
    .run(vec![cc_module("librecovery", caps).compile_multilib("32")])
    .unwrap();
  let variants = graph.variants("librecovery");
  assert_eq!(variants.len(), 1);
  assert!(!variants[0].enabled());
}

#[test]
fn invalid_multilib_is_a_module_error() {
  let engine = device_engine();
  let graph = engine
    .run(vec![
      cc_module("libbad", Capabilities::default()).compile_multilib("all"),
      cc_module("libgood", Capabilities::default()),
    ])
    .unwrap();

  assert_eq!(graph.errors().len(), 1);
  assert_eq!(graph.errors()[0].module, "libbad");
  assert_eq!(graph.errors()[0].variations, "os:android");
  assert_eq!(graph.errors()[0].error, VariantError::InvalidMultilib("all".into()));
  assert!(!graph.variants("libbad")[0].enabled());
  assert_eq!(arch_names(&graph, "libgood"), vec!["arm64"]);
  assert!(graph.check().is_err());
}

#[test]
fn darwin_universal_links_primary_to_secondary() {
  let engine = engine(OsType::Darwin, r#"{"HostArch": "x86_64", "HostSecondaryArch": "arm64"}"#);
  let graph = engine.run(vec![cc_module("tool", Capabilities::host_only())]).unwrap();

  // Reversed so the configured primary arch is created last.
  assert_eq!(arch_names(&graph, "tool"), vec!["arm64", "x86_64"]);
  let arm64 = graph.find("tool", &[("os", "darwin"), ("arch", "arm64")]).unwrap();
  let x86_64 = graph.find("tool", &[("os", "darwin"), ("arch", "x86_64")]).unwrap();

  assert_eq!(
    graph.dependencies(x86_64),
    vec![(arm64, &DependencyTag::DarwinUniversalVariant)]
  );
  assert!(graph.dependencies(arm64).is_empty());
  assert!(graph.module(arm64).is_primary());
  assert!(graph.check().is_ok());
}

#[test]
fn darwin_32_bit_request_is_not_universal() {
  let engine = engine(OsType::Darwin, r#"{"HostArch": "x86_64", "HostSecondaryArch": "arm64"}"#);
  let graph = engine
    .run(vec![cc_module("tool", Capabilities::host_only()).compile_multilib("32")])
    .unwrap();
  let variants = graph.variants("tool");
  assert_eq!(variants.len(), 1);
  assert!(!variants[0].enabled());
}

#[test]
fn darwin_host_cross_skips_install() {
  let engine = engine(OsType::Linux, r#"{"HostArch": "x86_64", "CrossHost": "darwin", "CrossHostArch": "arm64"}"#);
  let graph = engine.run(vec![cc_module("tool", Capabilities::host_only())]).unwrap();

  let darwin = graph.variant("tool", &[("os", "darwin"), ("arch", "arm64")]).unwrap();
  assert!(darwin.skip_install());
  let linux = graph.variant("tool", &[("os", "linux_glibc"), ("arch", "x86_64")]).unwrap();
  assert!(!linux.skip_install());
}

#[test]
fn common_style_module_collects_multi_targets() {
  let engine = device_engine();
  let caps = Capabilities {
    default_multilib: "common".into(),
    uses_target_variants: false,
    ..Capabilities::default()
  };

  let graph = engine
    .run(vec![cc_module("apex", caps.clone()).compile_multilib("both")])
    .unwrap();
  assert_eq!(arch_names(&graph, "apex"), vec!["common"]);
  let apex = &graph.variants("apex")[0];
  let multi: Vec<_> = apex.multi_targets().iter().map(|t| t.arch_variation()).collect();
  assert_eq!(multi, vec!["arm64", "arm"]);

  // Asking for the default is the same as asking for "first".
  let graph = engine.run(vec![cc_module("apex", caps)]).unwrap();
  let apex = &graph.variants("apex")[0];
  let multi: Vec<_> = apex.multi_targets().iter().map(|t| t.arch_variation()).collect();
  assert_eq!(multi, vec!["arm64"]);
}

#[test]
fn prefer32_coercion_applies_to_device_only() {
  let engine = engine(
    OsType::Linux,
    r#"{
      "HostArch": "x86_64",
      "CrossHost": "windows",
      "CrossHostArch": "x86",
      "CrossHostSecondaryArch": "x86_64",
      "DeviceArch": "arm64",
      "DeviceSecondaryArch": "arm",
      "IgnorePrefer32OnDevice": true
    }"#,
  );
  let graph = engine
    .run(vec![cc_module("tool", Capabilities::host_and_device()).compile_multilib("prefer32")])
    .unwrap();

  let windows = graph.variant("tool", &[("os", "windows"), ("arch", "x86")]).unwrap();
  assert_eq!(decode_multilib(windows, engine.config()), ("prefer32".to_string(), String::new()));

  let device: Vec<_> = graph
    .variants("tool")
    .into_iter()
    .filter(|m| m.os() == Some(OsType::Android))
    .collect();
  assert_eq!(device.len(), 1);
  assert_eq!(device[0].variation("arch"), "arm64");
  assert_eq!(decode_multilib(device[0], engine.config()).0, "first");
}

#[test]
fn per_class_multilib_wins_over_module_value() {
  let engine = device_engine();
  let module = ModuleDecl::new("libfoo", Capabilities::host_and_device()).multilib(MultilibProperties {
    compile_multilib: Some("64".into()),
    android_compile_multilib: Some("32".into()),
    ..Default::default()
  });
  let graph = engine.run(vec![module]).unwrap();
  assert_eq!(arch_names(&graph, "libfoo"), vec!["x86_64", "arm"]);
}
