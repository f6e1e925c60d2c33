use std::collections::BTreeMap;
use std::sync::Arc;

use archsplit_lib::props::squash::squash_scopes;
use archsplit_lib::props::{
  FieldDecl, Fragment, FragmentType, PropertyOverrides, SchemaCache, SlotLayout, arch_scopes, build_schema, os_scopes,
  squash_arch, squash_os,
};
use archsplit_lib::{Capabilities, ModuleDecl, PropertyError, PropertySet, VariantError};
use archsplit_platform::{OsType, Target, decode_arch};
use proptest::prelude::*;

use super::common::{cc_srcs, cc_type, device_engine, engine, srcs, vars};

/// One override per slot a glibc x86_64 host or an arm64 device can hit,
/// each adding its own path to `srcs`. Feature slots are only filled on
/// device targets, so `arch.x86_64.avx2` never applies to the host.
fn tagged_overrides() -> BTreeMap<String, Fragment> {
  [
    "target.host",
    "target.linux",
    "target.host_linux",
    "target.bionic",
    "target.glibc",
    "target.linux_glibc",
    "target.not_windows",
    "target.android",
    "target.android64",
    "arch.x86_64",
    "arch.x86_64.haswell",
    "arch.x86_64.avx2",
    "arch.arm64",
    "arch.arm64.armv8-2a-dotprod",
    "arch.arm64.cortex-a55",
    "arch.arm64.dotprod",
    "multilib.lib64",
    "target.linux_x86_64",
    "target.host_linux_x86_64",
    "target.linux_glibc_x86_64",
    "target.glibc_x86_64",
    "target.linux_arm64",
    "target.bionic_arm64",
    "target.android_arm64",
  ]
  .into_iter()
  .map(|path| (path.to_string(), srcs(&[path])))
  .collect()
}

fn config() -> archsplit_platform::Config {
  archsplit_platform::Config::new(
    OsType::Linux,
    &vars(
      r#"{"HostArch": "x86_64", "DeviceArch": "arm64", "DeviceArchVariant": "armv8-2a-dotprod", "DeviceCpuVariant": "cortex-a55"}"#,
    ),
  )
  .unwrap()
}

fn targets() -> Vec<Target> {
  let device = decode_arch(OsType::Android, "arm64", Some("armv8-2a-dotprod"), Some("cortex-a55"), &[]).unwrap();
  let host = decode_arch(OsType::Linux, "x86_64", Some("haswell"), None, &[]).unwrap();
  vec![Target::new(OsType::Android, device), Target::new(OsType::Linux, host)]
}

#[test]
fn os_then_arch_equals_single_walk() {
  let cache = SchemaCache::new();
  let config = config();
  let overrides = vec![PropertyOverrides::new(cc_type(), &tagged_overrides(), &cache).unwrap()];

  for target in targets() {
    let mut phased = vec![srcs(&["base"])];
    squash_os(&overrides, &mut phased, target.os, &config).unwrap();
    squash_arch(&overrides, &mut phased, &target, &config).unwrap();

    let mut combined = srcs(&["base"]);
    let mut scopes = os_scopes(target.os, config.android_64());
    scopes.extend(arch_scopes(&target, config.has_arm_device_arch()));
    squash_scopes(&overrides[0], &mut combined, &scopes).unwrap();

    assert_eq!(phased[0], combined, "target {target}");
  }
}

#[test]
fn device_precedence_order() {
  let cache = SchemaCache::new();
  let config = config();
  let overrides = vec![PropertyOverrides::new(cc_type(), &tagged_overrides(), &cache).unwrap()];
  let target = &targets()[0];

  let mut properties = vec![srcs(&["base"])];
  squash_os(&overrides, &mut properties, target.os, &config).unwrap();
  squash_arch(&overrides, &mut properties, target, &config).unwrap();

  assert_eq!(
    properties[0].list("srcs"),
    [
      "base",
      "target.linux",
      "target.bionic",
      "target.android",
      "target.android64",
      "arch.arm64",
      "arch.arm64.armv8-2a-dotprod",
      "arch.arm64.cortex-a55",
      "arch.arm64.dotprod",
      "multilib.lib64",
      "target.linux_arm64",
      "target.bionic_arm64",
      "target.android_arm64",
    ]
  );
}

#[test]
fn host_precedence_order() {
  let cache = SchemaCache::new();
  let config = config();
  let overrides = vec![PropertyOverrides::new(cc_type(), &tagged_overrides(), &cache).unwrap()];
  let target = &targets()[1];

  let mut properties = vec![srcs(&["base"])];
  squash_os(&overrides, &mut properties, target.os, &config).unwrap();
  squash_arch(&overrides, &mut properties, target, &config).unwrap();

  assert_eq!(
    properties[0].list("srcs"),
    [
      "base",
      "target.host",
      "target.linux",
      "target.host_linux",
      "target.glibc",
      "target.linux_glibc",
      "target.not_windows",
      "arch.x86_64",
      "arch.x86_64.haswell",
      "multilib.lib64",
      "target.linux_x86_64",
      "target.host_linux_x86_64",
      "target.linux_glibc_x86_64",
      "target.glibc_x86_64",
    ]
  );
}

#[test]
fn merge_tags_apply_through_variants() {
  let engine = device_engine();
  let set = PropertySet::new(cc_type())
    .with_base(
      Fragment::new()
        .with("cflags", vec!["-Wall"])
        .with("ldflags", vec!["-lbase"])
        .with("stl", "libc++"),
    )
    .with_override(
      "target.android",
      Fragment::new()
        .with("cflags", vec!["-DANDROID"])
        .with("ldflags", vec!["-landroid"])
        .with("stl", "none"),
    )
    .with_override("arch.arm64", Fragment::new().with("cflags", vec!["-march=armv8-a"]));

  let graph = engine
    .run(vec![ModuleDecl::new("libfoo", Capabilities::default()).property_set(set)])
    .unwrap();
  let cc = graph
    .variant("libfoo", &[("os", "android"), ("arch", "arm64")])
    .and_then(|m| m.properties("cc"))
    .unwrap();

  assert_eq!(cc.list("cflags"), ["-march=armv8-a", "-DANDROID", "-Wall"]);
  assert_eq!(cc.list("ldflags"), ["-landroid"]);
  assert_eq!(cc.get("stl").and_then(|v| v.as_str()), Some("none"));
}

#[test]
fn variants_get_their_own_overrides() {
  let engine = device_engine();
  let set = PropertySet::new(cc_type())
    .with_base(srcs(&["common.c"]))
    .with_override("multilib.lib32", srcs(&["lib32.c"]))
    .with_override("multilib.lib64", srcs(&["lib64.c"]))
    .with_override("target.host", srcs(&["host.c"]));

  let graph = engine
    .run(vec![
      ModuleDecl::new("libfoo", Capabilities::host_and_device())
        .compile_multilib("both")
        .property_set(set),
    ])
    .unwrap();

  assert_eq!(cc_srcs(&graph, "libfoo", "android", "arm64"), ["common.c", "lib64.c"]);
  assert_eq!(cc_srcs(&graph, "libfoo", "android", "arm"), ["common.c", "lib32.c"]);
  assert_eq!(cc_srcs(&graph, "libfoo", "linux_glibc", "x86"), ["common.c", "host.c", "lib32.c"]);
}

#[test]
fn arm_translation_and_native_bridge_slots() {
  let engine = engine(
    OsType::Linux,
    r#"{"HostArch": "x86_64", "DeviceArch": "x86_64", "NativeBridgeArch": "arm64"}"#,
  );
  let set = PropertySet::new(cc_type())
    .with_override("target.arm_on_x86_64", srcs(&["houdini.c"]))
    .with_override("target.native_bridge", srcs(&["bridge.c"]));
  let caps = Capabilities {
    native_bridge_supported: true,
    ..Capabilities::default()
  };

  let graph = engine
    .run(vec![
      ModuleDecl::new("libfoo", caps)
        .compile_multilib("64")
        .property_set(set),
    ])
    .unwrap();

  assert_eq!(cc_srcs(&graph, "libfoo", "android", "x86_64"), ["houdini.c"]);
  assert_eq!(cc_srcs(&graph, "libfoo", "android", "native_bridge_arm64"), ["bridge.c"]);
}

#[test]
fn windows_enabled_by_override() {
  let engine = engine(
    OsType::Linux,
    r#"{"HostArch": "x86_64", "CrossHost": "windows", "CrossHostArch": "x86"}"#,
  );
  let set = PropertySet::new(cc_type()).with_override("target.windows", Fragment::new().with("enabled", true));
  let graph = engine
    .run(vec![ModuleDecl::new("tool", Capabilities::host_only()).property_set(set)])
    .unwrap();

  let windows = graph.variant("tool", &[("os", "windows"), ("arch", "x86")]).unwrap();
  assert!(windows.enabled());
}

#[test]
fn disabled_on_one_arch() {
  let engine = device_engine();
  let set = PropertySet::new(cc_type()).with_override("arch.arm", Fragment::new().with("enabled", false));
  let graph = engine
    .run(vec![
      ModuleDecl::new("libfoo", Capabilities::default())
        .compile_multilib("both")
        .property_set(set),
    ])
    .unwrap();

  let enabled: Vec<_> = graph.variants("libfoo").iter().map(|m| m.enabled()).collect();
  assert_eq!(enabled, vec![true, false]);
}

#[test]
fn bad_override_disables_module() {
  let engine = device_engine();
  let set = PropertySet::new(cc_type()).with_override("target.android", Fragment::new().with("owner", "me"));
  let graph = engine
    .run(vec![ModuleDecl::new("libfoo", Capabilities::default()).property_set(set)])
    .unwrap();

  assert_eq!(graph.errors().len(), 1);
  assert_eq!(
    graph.errors()[0].error,
    VariantError::Property(PropertyError::NotArchVariant("target.android.owner".into()))
  );
  assert!(graph.variants("libfoo").iter().all(|m| !m.enabled()));
}

#[test]
fn shared_schema_per_fragment_type() {
  let engine = device_engine();
  let modules = (0..4)
    .map(|i| {
      ModuleDecl::new(format!("lib{i}"), Capabilities::default())
        .property_set(PropertySet::new(cc_type()).with_override("arch.arm64", srcs(&["a.c"])))
    })
    .collect();
  let graph = engine.run(modules).unwrap();
  assert!(graph.check().is_ok());
  assert_eq!(engine.schemas().len(), 1);
}

fn arb_fragment_type() -> impl Strategy<Value = FragmentType> {
  prop::collection::vec(("[a-z_]{1,40}", any::<bool>(), 0..3u8), 0..60).prop_map(|fields| {
    fields
      .into_iter()
      .enumerate()
      .fold(FragmentType::new("generated"), |ty, (i, (name, arch_variant, kind))| {
        let name = format!("{name}_{i}");
        let field = match kind {
          0 => FieldDecl::bool(name),
          1 => FieldDecl::string(name),
          _ => FieldDecl::string_list(name),
        };
        ty.field(if arch_variant { field.arch_variant() } else { field })
      })
  })
}

proptest! {
  #[test]
  fn schema_generation_is_idempotent(ty in arb_fragment_type()) {
    let layout = Arc::new(SlotLayout::new());
    let first = build_schema(&ty, &layout);
    let second = build_schema(&ty, &Arc::new(SlotLayout::new()));
    prop_assert_eq!(&first, &second);

    let paths = |schema: &[archsplit_lib::props::ArchPropTypeDesc]| {
      schema.iter().flat_map(|d| d.field_paths()).collect::<Vec<_>>()
    };
    prop_assert_eq!(paths(&first), paths(&second));

    let flagged: Vec<_> = ty.fields().iter().filter(|f| f.arch_variant).map(|f| f.name.clone()).collect();
    let sharded: Vec<_> = first.iter().flat_map(|d| d.shard().fields().iter().map(|f| f.name.clone())).collect();
    prop_assert_eq!(flagged, sharded);
  }
}
