//! Architecture registry and the `Arch` value type.
//!
//! The registry is a closed set known at compile time. Variant, cpu variant
//! and feature tables are static and drive both validation of the product
//! configuration and generation of override slots for `arch: { <type>: { .. } }`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::os::{OsClass, OsType};

/// Which multilib family an architecture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Multilib {
  Lib32,
  Lib64,
}

impl Multilib {
  /// Property name used under `multilib: { .. }`.
  pub const fn as_str(&self) -> &'static str {
    match self {
      Multilib::Lib32 => "lib32",
      Multilib::Lib64 => "lib64",
    }
  }

  /// Generated field name of the override slot.
  pub const fn field_name(&self) -> &'static str {
    match self {
      Multilib::Lib32 => "Lib32",
      Multilib::Lib64 => "Lib64",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "lib32" => Some(Multilib::Lib32),
      "lib64" => Some(Multilib::Lib64),
      _ => None,
    }
  }
}

impl fmt::Display for Multilib {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// CPU architecture types known to the engine.
///
/// `Common` is a pseudo-architecture standing for "architecture independent".
/// It never appears in a configured device or host target list; it is only
/// used by the common targets of each OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchType {
  Arm,
  Arm64,
  Riscv64,
  X86,
  X86_64,
  Common,
}

impl ArchType {
  /// All real architectures in registration order. `Common` is excluded.
  pub const ALL: [ArchType; 5] = [
    ArchType::Arm,
    ArchType::Arm64,
    ArchType::Riscv64,
    ArchType::X86,
    ArchType::X86_64,
  ];

  pub const fn name(&self) -> &'static str {
    match self {
      ArchType::Arm => "arm",
      ArchType::Arm64 => "arm64",
      ArchType::Riscv64 => "riscv64",
      ArchType::X86 => "x86",
      ArchType::X86_64 => "x86_64",
      ArchType::Common => "common",
    }
  }

  /// Generated field name of the `arch: { <type>: .. }` slot.
  pub const fn field_name(&self) -> &'static str {
    match self {
      ArchType::Arm => "Arm",
      ArchType::Arm64 => "Arm64",
      ArchType::Riscv64 => "Riscv64",
      ArchType::X86 => "X86",
      ArchType::X86_64 => "X86_64",
      ArchType::Common => "Common",
    }
  }

  /// Multilib class, `None` for the common pseudo-arch.
  pub const fn multilib(&self) -> Option<Multilib> {
    match self {
      ArchType::Arm | ArchType::X86 => Some(Multilib::Lib32),
      ArchType::Arm64 | ArchType::Riscv64 | ArchType::X86_64 => Some(Multilib::Lib64),
      ArchType::Common => None,
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|arch| arch.name() == name)
  }

  /// Valid values of `arch_variant` for this architecture.
  pub fn arch_variants(&self) -> &'static [&'static str] {
    match self {
      ArchType::Arm => &["armv7-a", "armv7-a-neon", "armv8-a", "armv8-2a"],
      ArchType::Arm64 => &["armv8-a", "armv8-a-branchprot", "armv8-2a", "armv8-2a-dotprod", "armv9-a"],
      ArchType::X86 => &[
        "amberlake",
        "atom",
        "broadwell",
        "goldmont",
        "goldmont-plus",
        "goldmont-without-sha-xsaves",
        "haswell",
        "icelake",
        "ivybridge",
        "kabylake",
        "sandybridge",
        "silvermont",
        "skylake",
        "stoneyridge",
        "tigerlake",
        "alderlake",
        "whiskeylake",
        "x86_64",
      ],
      ArchType::X86_64 => &[
        "amberlake",
        "broadwell",
        "goldmont",
        "goldmont-plus",
        "goldmont-without-sha-xsaves",
        "haswell",
        "icelake",
        "ivybridge",
        "kabylake",
        "sandybridge",
        "silvermont",
        "skylake",
        "stoneyridge",
        "tigerlake",
        "alderlake",
        "whiskeylake",
      ],
      ArchType::Riscv64 | ArchType::Common => &[],
    }
  }

  /// Valid values of `cpu_variant` for this architecture.
  pub fn cpu_variants(&self) -> &'static [&'static str] {
    match self {
      ArchType::Arm => &[
        "cortex-a5",
        "cortex-a7",
        "cortex-a8",
        "cortex-a9",
        "cortex-a15",
        "cortex-a32",
        "cortex-a53",
        "cortex-a53.a57",
        "cortex-a55",
        "cortex-a72",
        "cortex-a75",
        "cortex-a76",
        "krait",
        "kryo",
        "kryo385",
        "exynos-m1",
        "exynos-m2",
      ],
      ArchType::Arm64 => &[
        "cortex-a53",
        "cortex-a55",
        "cortex-a72",
        "cortex-a73",
        "cortex-a75",
        "cortex-a76",
        "kryo",
        "kryo385",
        "exynos-m1",
        "exynos-m2",
      ],
      ArchType::X86 | ArchType::X86_64 | ArchType::Riscv64 | ArchType::Common => &[],
    }
  }

  /// Every feature name that may appear in an `Arch` of this type.
  pub fn features(&self) -> &'static [&'static str] {
    match self {
      ArchType::Arm => &["neon"],
      ArchType::Arm64 => &["dotprod"],
      ArchType::X86 => &[
        "ssse3", "sse4", "sse4_1", "sse4_2", "aes_ni", "avx", "avx2", "avx512", "popcnt", "movbe",
      ],
      ArchType::X86_64 => &[
        "ssse3", "sse4", "sse4_1", "sse4_2", "aes_ni", "avx", "avx2", "avx512", "popcnt",
      ],
      ArchType::Riscv64 | ArchType::Common => &[],
    }
  }
}

impl fmt::Display for ArchType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

const X86_HASWELL_FEATURES: &[&str] = &["ssse3", "sse4", "sse4_1", "sse4_2", "aes_ni", "avx", "avx2", "popcnt"];
const X86_SKYLAKE_FEATURES: &[&str] = &[
  "ssse3", "sse4", "sse4_1", "sse4_2", "aes_ni", "avx", "avx2", "avx512", "popcnt",
];
const X86_SILVERMONT_FEATURES: &[&str] = &["ssse3", "sse4", "sse4_1", "sse4_2", "aes_ni", "popcnt"];
const X86_SANDYBRIDGE_FEATURES: &[&str] = &["ssse3", "sse4", "sse4_1", "sse4_2", "popcnt"];

/// Features enabled by default for `(arch_type, arch_variant)` on the device OS.
fn device_arch_features(arch_type: ArchType, arch_variant: &str) -> &'static [&'static str] {
  match (arch_type, arch_variant) {
    (ArchType::Arm, "armv7-a-neon" | "armv8-a" | "armv8-2a") => &["neon"],
    (ArchType::Arm64, "armv8-2a-dotprod" | "armv9-a") => &["dotprod"],
    (ArchType::X86, "atom") => &["ssse3", "movbe"],
    (ArchType::X86, "x86_64") => &["ssse3", "sse4", "sse4_1", "sse4_2", "popcnt"],
    (ArchType::X86_64, "") => &["ssse3", "sse4", "sse4_1", "sse4_2", "popcnt"],
    (
      ArchType::X86 | ArchType::X86_64,
      "amberlake" | "broadwell" | "haswell" | "kabylake" | "whiskeylake" | "alderlake",
    ) => X86_HASWELL_FEATURES,
    (ArchType::X86 | ArchType::X86_64, "skylake" | "icelake" | "tigerlake") => X86_SKYLAKE_FEATURES,
    (
      ArchType::X86 | ArchType::X86_64,
      "silvermont" | "goldmont" | "goldmont-plus" | "goldmont-without-sha-xsaves" | "stoneyridge",
    ) => X86_SILVERMONT_FEATURES,
    (ArchType::X86 | ArchType::X86_64, "sandybridge" | "ivybridge") => X86_SANDYBRIDGE_FEATURES,
    _ => &[],
  }
}

/// A concrete architecture selection: type plus variant refinements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arch {
  pub arch_type: ArchType,
  /// Empty when the variant is generic.
  pub arch_variant: String,
  /// Empty when the cpu variant is generic.
  pub cpu_variant: String,
  pub abi: Vec<String>,
  pub arch_features: Vec<String>,
}

impl Arch {
  /// The architecture-independent pseudo-arch.
  pub fn common() -> Self {
    Self {
      arch_type: ArchType::Common,
      arch_variant: String::new(),
      cpu_variant: String::new(),
      abi: Vec::new(),
      arch_features: Vec::new(),
    }
  }

  /// `true` if any configured ABI is an arm ABI.
  pub fn has_arm_abi(&self) -> bool {
    self.abi.iter().any(|abi| abi.starts_with("arm"))
  }
}

impl fmt::Display for Arch {
  /// `<type>[_<arch_variant>][_<cpu_variant>]`
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.arch_type)?;
    if !self.arch_variant.is_empty() {
      write!(f, "_{}", self.arch_variant)?;
    }
    if !self.cpu_variant.is_empty() {
      write!(f, "_{}", self.cpu_variant)?;
    }
    Ok(())
  }
}

fn normalize_variant(arch_type: ArchType, variant: Option<&str>) -> String {
  match variant {
    None => String::new(),
    Some(v) if v == arch_type.name() || v == "generic" => String::new(),
    Some(v) => v.to_string(),
  }
}

/// Decode an architecture selection from product configuration values.
///
/// # Errors
///
/// Returns an error if the arch name is not registered or a non-generic
/// variant is not listed for that architecture.
pub fn decode_arch(
  os: OsType,
  arch: &str,
  arch_variant: Option<&str>,
  cpu_variant: Option<&str>,
  abi: &[String],
) -> Result<Arch, PlatformError> {
  let arch_type = ArchType::from_name(arch).ok_or_else(|| PlatformError::UnknownArch(arch.to_string()))?;

  let arch_variant = normalize_variant(arch_type, arch_variant);
  let cpu_variant = normalize_variant(arch_type, cpu_variant);

  if !arch_variant.is_empty() && !arch_type.arch_variants().contains(&arch_variant.as_str()) {
    return Err(PlatformError::UnknownArchVariant {
      arch: arch_type.name().to_string(),
      variant: arch_variant,
      supported: arch_type.arch_variants().to_vec(),
    });
  }

  if !cpu_variant.is_empty() && !arch_type.cpu_variants().contains(&cpu_variant.as_str()) {
    return Err(PlatformError::UnknownCpuVariant {
      arch: arch_type.name().to_string(),
      variant: cpu_variant,
      supported: arch_type.cpu_variants().to_vec(),
    });
  }

  let arch_features = if os.class() == OsClass::Device {
    device_arch_features(arch_type, &arch_variant)
      .iter()
      .map(|f| f.to_string())
      .collect()
  } else {
    Vec::new()
  };

  Ok(Arch {
    arch_type,
    arch_variant,
    cpu_variant,
    abi: abi.iter().filter(|a| !a.is_empty()).cloned().collect(),
    arch_features,
  })
}
