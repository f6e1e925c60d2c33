//! Operating system registry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arch::ArchType;

/// Coarse classification of an OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsClass {
  /// Only used by the synthetic combined-OS variant.
  Generic,
  Device,
  Host,
}

/// Operating systems a module can be built for.
///
/// Declaration order is registry order: OS variants of a module are created
/// in this order, and `CommonOs` is always last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OsType {
  #[serde(rename = "linux_glibc")]
  Linux,
  #[serde(rename = "linux_musl")]
  LinuxMusl,
  #[serde(rename = "darwin")]
  Darwin,
  #[serde(rename = "linux_bionic")]
  LinuxBionic,
  #[serde(rename = "windows")]
  Windows,
  #[serde(rename = "android")]
  Android,
  #[serde(rename = "common_os")]
  CommonOs,
}

impl OsType {
  /// All OS types in registry order, `CommonOs` included.
  pub const ALL: [OsType; 7] = [
    OsType::Linux,
    OsType::LinuxMusl,
    OsType::Darwin,
    OsType::LinuxBionic,
    OsType::Windows,
    OsType::Android,
    OsType::CommonOs,
  ];

  /// Detect the OS the build runs on at compile time
  #[cfg(target_os = "macos")]
  pub const fn current() -> Self {
    OsType::Darwin
  }

  #[cfg(target_os = "windows")]
  pub const fn current() -> Self {
    OsType::Windows
  }

  #[cfg(not(any(target_os = "macos", target_os = "windows")))]
  pub const fn current() -> Self {
    OsType::Linux
  }

  /// Variation name of the OS.
  pub const fn name(&self) -> &'static str {
    match self {
      OsType::Linux => "linux_glibc",
      OsType::LinuxMusl => "linux_musl",
      OsType::Darwin => "darwin",
      OsType::LinuxBionic => "linux_bionic",
      OsType::Windows => "windows",
      OsType::Android => "android",
      OsType::CommonOs => "common_os",
    }
  }

  /// Generated field name of the `target: { <os>: .. }` slot.
  pub const fn field_name(&self) -> &'static str {
    match self {
      OsType::Linux => "Linux_glibc",
      OsType::LinuxMusl => "Linux_musl",
      OsType::Darwin => "Darwin",
      OsType::LinuxBionic => "Linux_bionic",
      OsType::Windows => "Windows",
      OsType::Android => "Android",
      OsType::CommonOs => "Common_os",
    }
  }

  pub const fn class(&self) -> OsClass {
    match self {
      OsType::Android => OsClass::Device,
      OsType::CommonOs => OsClass::Generic,
      _ => OsClass::Host,
    }
  }

  /// Modules are disabled on this OS unless they explicitly enable it.
  pub const fn default_disabled(&self) -> bool {
    matches!(self, OsType::Windows)
  }

  pub fn by_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|os| os.name() == name)
  }

  /// Linux kernel based OSes, device included.
  pub const fn is_linux(&self) -> bool {
    matches!(
      self,
      OsType::Android | OsType::Linux | OsType::LinuxBionic | OsType::LinuxMusl
    )
  }

  /// OSes using the bionic libc.
  pub const fn is_bionic(&self) -> bool {
    matches!(self, OsType::Android | OsType::LinuxBionic)
  }

  /// Architectures that may be configured for this OS.
  pub fn arch_types(&self) -> &'static [ArchType] {
    match self {
      OsType::Android => &[
        ArchType::Arm,
        ArchType::Arm64,
        ArchType::Riscv64,
        ArchType::X86,
        ArchType::X86_64,
      ],
      OsType::Darwin => &[ArchType::Arm64, ArchType::X86_64],
      OsType::Linux => &[ArchType::Arm64, ArchType::X86, ArchType::X86_64],
      OsType::LinuxBionic => &[ArchType::Arm64, ArchType::X86_64],
      OsType::LinuxMusl => &[ArchType::Arm64, ArchType::Arm, ArchType::X86, ArchType::X86_64],
      OsType::Windows => &[ArchType::X86, ArchType::X86_64],
      OsType::CommonOs => &[],
    }
  }

  pub fn supports_arch(&self, arch_type: ArchType) -> bool {
    arch_type == ArchType::Common || self.arch_types().contains(&arch_type)
  }
}

impl fmt::Display for OsType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}
