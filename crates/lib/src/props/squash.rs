//! Squashing override slots into a module's effective properties.
//!
//! The precedence order is fixed. OS slots are applied when the OS of a
//! variant is known, arch slots once its target is known; applying the OS walk
//! and then the arch walk is the same as applying `os_scopes ++ arch_scopes`
//! in one pass.

use archsplit_platform::{ArchType, Config, OsClass, OsType, Target};

use crate::error::PropertyError;

use super::fragment::Fragment;
use super::overrides::{OverrideScope, PropertyOverrides};

/// Slots applied for `os`, in precedence order.
pub fn os_scopes(os: OsType, android_64: bool) -> Vec<OverrideScope> {
  let mut scopes = Vec::new();
  let class = os.class();

  if class == OsClass::Host {
    scopes.push(OverrideScope::target("Host"));
  }
  if os.is_linux() {
    scopes.push(OverrideScope::target("Linux"));
  }
  if os.is_linux() && class == OsClass::Host {
    scopes.push(OverrideScope::target("Host_linux"));
  }
  if os.is_bionic() {
    scopes.push(OverrideScope::target("Bionic"));
  }
  if os == OsType::Linux {
    scopes.push(OverrideScope::target("Glibc"));
  }
  if os == OsType::LinuxMusl {
    scopes.push(OverrideScope::target("Musl"));
  }
  scopes.push(OverrideScope::target(os.field_name()));
  if class == OsClass::Host && os != OsType::Windows {
    scopes.push(OverrideScope::target("Not_windows"));
  }
  if class == OsClass::Device {
    scopes.push(OverrideScope::target(if android_64 { "Android64" } else { "Android32" }));
  }
  scopes
}

/// Slots applied for `target`, in precedence order.
///
/// `has_arm_device_arch` is whether any configured device target is arm or
/// arm64; it enables the `arm_on_x86*` slots for x86 device targets.
pub fn arch_scopes(target: &Target, has_arm_device_arch: bool) -> Vec<OverrideScope> {
  let mut scopes = Vec::new();
  let arch = &target.arch;
  let arch_type = arch.arch_type;
  let os = target.os;

  if arch_type != ArchType::Common {
    scopes.push(OverrideScope::arch(arch_type));

    if !arch.arch_variant.is_empty() {
      scopes.push(OverrideScope::arch_variant(arch_type, &arch.arch_variant));
    }
    if !arch.cpu_variant.is_empty() && arch.cpu_variant != arch.arch_variant {
      scopes.push(OverrideScope::arch_variant(arch_type, &arch.cpu_variant));
    }
    for feature in &arch.arch_features {
      scopes.push(OverrideScope::arch_variant(arch_type, feature));
    }

    if let Some(multilib) = arch_type.multilib() {
      scopes.push(OverrideScope::Multilib(multilib));
    }

    let name = arch_type.name();
    if os.is_linux() {
      scopes.push(OverrideScope::target(format!("Linux_{name}")));
    }
    if os.is_linux() && os.class() == OsClass::Host {
      scopes.push(OverrideScope::target(format!("Host_linux_{name}")));
    }
    if os.is_bionic() {
      scopes.push(OverrideScope::target(format!("Bionic_{name}")));
    }
    scopes.push(OverrideScope::target(format!("{}_{name}", os.field_name())));
    if os == OsType::Linux {
      scopes.push(OverrideScope::target(format!("Glibc_{name}")));
    }
    if os == OsType::LinuxMusl {
      scopes.push(OverrideScope::target(format!("Musl_{name}")));
    }
  }

  if os.class() == OsClass::Device {
    let arm_translated = arch.has_arm_abi() || has_arm_device_arch;
    if arch_type == ArchType::X86 && arm_translated {
      scopes.push(OverrideScope::target("Arm_on_x86"));
    }
    if arch_type == ArchType::X86_64 && arm_translated {
      scopes.push(OverrideScope::target("Arm_on_x86_64"));
    }
    if os == OsType::Android && target.native_bridge {
      scopes.push(OverrideScope::target("Native_bridge"));
    }
  }

  scopes
}

/// Merge the slots named by `scopes` into `base`, skipping empty slots.
///
/// Shards are walked in declaration order; each shard walks `scopes` in order.
pub fn squash_scopes(
  overrides: &PropertyOverrides,
  base: &mut Fragment,
  scopes: &[OverrideScope],
) -> Result<(), PropertyError> {
  for tree in overrides.trees() {
    for scope in scopes {
      if let Some(values) = tree.get(scope) {
        super::merge::merge_fragment(overrides.fragment_type(), base, values, &scope.to_string())?;
      }
    }
  }
  Ok(())
}

/// Apply the OS-specific slots of every property set to `properties`.
///
/// `properties[i]` is the effective fragment of `overrides[i]`.
pub fn squash_os(
  overrides: &[PropertyOverrides],
  properties: &mut [Fragment],
  os: OsType,
  config: &Config,
) -> Result<(), PropertyError> {
  let scopes = os_scopes(os, config.android_64());
  for (set, base) in overrides.iter().zip(properties.iter_mut()) {
    squash_scopes(set, base, &scopes)?;
  }
  Ok(())
}

/// Apply the arch-specific slots of every property set to `properties`.
pub fn squash_arch(
  overrides: &[PropertyOverrides],
  properties: &mut [Fragment],
  target: &Target,
  config: &Config,
) -> Result<(), PropertyError> {
  let scopes = arch_scopes(target, config.has_arm_device_arch());
  for (set, base) in overrides.iter().zip(properties.iter_mut()) {
    squash_scopes(set, base, &scopes)?;
  }
  Ok(())
}
