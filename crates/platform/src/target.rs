//! Build targets: an OS paired with a concrete architecture.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arch::{Arch, ArchType, Multilib};
use crate::os::OsType;

/// One (OS, architecture) combination available to the build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
  pub os: OsType,
  pub arch: Arch,
  pub native_bridge: bool,
  /// Arch name of the non-bridged device target a bridged target runs on.
  pub native_bridge_host_arch_name: String,
  pub native_bridge_relative_path: String,
  /// The target cannot run natively on the build machine.
  pub host_cross: bool,
}

impl Target {
  /// A plain target with no native bridge and no cross flag.
  pub fn new(os: OsType, arch: Arch) -> Self {
    Self {
      os,
      arch,
      native_bridge: false,
      native_bridge_host_arch_name: String::new(),
      native_bridge_relative_path: String::new(),
      host_cross: false,
    }
  }

  /// The architecture-independent target for `os`.
  pub fn common(os: OsType) -> Self {
    Self::new(os, Arch::common())
  }

  pub fn arch_type(&self) -> ArchType {
    self.arch.arch_type
  }

  pub fn multilib(&self) -> Option<Multilib> {
    self.arch.arch_type.multilib()
  }

  /// Value of the `os` variation for variants built for this target.
  pub fn os_variation(&self) -> String {
    self.os.name().to_string()
  }

  /// Value of the `arch` variation for variants built for this target.
  pub fn arch_variation(&self) -> String {
    if self.native_bridge {
      format!("native_bridge_{}", self.arch)
    } else {
      self.arch.to_string()
    }
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}_{}", self.os, self.arch_variation())
  }
}
