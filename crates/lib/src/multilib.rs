//! Multilib policy resolution.
//!
//! Pure functions deciding which policy applies to a module and which of the
//! configured targets that policy selects.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use archsplit_platform::{Config, Multilib, OsClass, OsType, Target};

use crate::error::VariantError;
use crate::module::Module;

/// A `compile_multilib` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultilibPolicy {
  Common,
  Both,
  Lib32,
  Lib64,
  First,
  FirstPrefer32,
  Prefer32,
  /// Reserved: both 64-bit Darwin arches, merged into one binary.
  DarwinUniversal,
}

impl MultilibPolicy {
  pub const fn as_str(&self) -> &'static str {
    match self {
      MultilibPolicy::Common => "common",
      MultilibPolicy::Both => "both",
      MultilibPolicy::Lib32 => "32",
      MultilibPolicy::Lib64 => "64",
      MultilibPolicy::First => "first",
      MultilibPolicy::FirstPrefer32 => "first_prefer32",
      MultilibPolicy::Prefer32 => "prefer32",
      MultilibPolicy::DarwinUniversal => "darwin_universal",
    }
  }
}

impl fmt::Display for MultilibPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for MultilibPolicy {
  type Err = VariantError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s {
      "common" => MultilibPolicy::Common,
      "both" => MultilibPolicy::Both,
      "32" => MultilibPolicy::Lib32,
      "64" => MultilibPolicy::Lib64,
      "first" => MultilibPolicy::First,
      "first_prefer32" => MultilibPolicy::FirstPrefer32,
      "prefer32" => MultilibPolicy::Prefer32,
      "darwin_universal" => MultilibPolicy::DarwinUniversal,
      other => return Err(VariantError::InvalidMultilib(other.to_string())),
    })
  }
}

/// Resolve the `(multilib, extra_multilib)` pair for a module whose OS is
/// already known.
///
/// Precedence: `target.<android|host>.compile_multilib`, then
/// `compile_multilib`, then the module type's default.
pub fn decode_multilib(module: &Module, config: &Config) -> (String, String) {
  let caps = module.capabilities();
  let props = module.multilib_properties();
  let os = module.os().unwrap_or(OsType::CommonOs);

  let by_class = match os.class() {
    OsClass::Device => props.android_compile_multilib.as_deref(),
    OsClass::Host => props.host_compile_multilib.as_deref(),
    OsClass::Generic => None,
  };

  let mut multilib = by_class
    .filter(|m| !m.is_empty())
    .or(props.compile_multilib.as_deref().filter(|m| !m.is_empty()))
    .unwrap_or(&caps.default_multilib)
    .to_string();

  if config.ignore_prefer32_on_device()
    && os.class() == OsClass::Device
    && (multilib == "prefer32" || multilib == "first_prefer32")
  {
    multilib = "first".to_string();
  }

  if caps.uses_target_variants {
    if os == OsType::Darwin && multilib != "common" && multilib != "32" {
      multilib = MultilibPolicy::DarwinUniversal.as_str().to_string();
    }
    (multilib, String::new())
  } else {
    // The module builds every selected target from one common-style variant;
    // its own request becomes the policy for the extra targets.
    if multilib == caps.default_multilib {
      multilib = "first".to_string();
    }
    (caps.default_multilib.clone(), multilib)
  }
}

/// Targets of `targets` whose arch belongs to `multilib`, in input order.
pub fn filter_multilib_targets(targets: &[Target], multilib: Multilib) -> Vec<Target> {
  targets
    .iter()
    .filter(|t| t.multilib() == Some(multilib))
    .cloned()
    .collect()
}

/// One common target per distinct OS, carrying the cross flag of the first
/// target seen for that OS.
pub fn common_targets(targets: &[Target]) -> Vec<Target> {
  let mut seen = HashSet::new();
  targets
    .iter()
    .filter(|t| seen.insert(t.os))
    .map(|t| {
      let mut common = Target::common(t.os);
      common.host_cross = t.host_cross;
      common
    })
    .collect()
}

/// The first target per distinct `(os, host_cross)` pair, trying the multilib
/// classes in the given order.
pub fn first_target(targets: &[Target], order: [Multilib; 2]) -> Vec<Target> {
  let mut seen = HashSet::new();
  let mut result = Vec::new();
  for multilib in order {
    for target in filter_multilib_targets(targets, multilib) {
      if seen.insert((target.os, target.host_cross)) {
        result.push(target);
      }
    }
  }
  result
}

/// Keep only targets whose cross flag equals `host_cross`.
pub fn filter_host_cross(targets: Vec<Target>, host_cross: bool) -> Vec<Target> {
  targets.into_iter().filter(|t| t.host_cross == host_cross).collect()
}

/// Expand a multilib policy into the targets it selects from `targets`.
///
/// # Errors
///
/// Returns `InvalidMultilib` for an unknown policy string.
pub fn decode_multilib_targets(policy: &str, targets: &[Target], prefer_lib32: bool) -> Result<Vec<Target>, VariantError> {
  let (primary, secondary) = if prefer_lib32 {
    (Multilib::Lib32, Multilib::Lib64)
  } else {
    (Multilib::Lib64, Multilib::Lib32)
  };

  Ok(match policy.parse::<MultilibPolicy>()? {
    MultilibPolicy::Common => common_targets(targets),
    MultilibPolicy::Both => {
      let mut both = filter_multilib_targets(targets, primary);
      both.extend(filter_multilib_targets(targets, secondary));
      both
    }
    MultilibPolicy::Lib32 => filter_multilib_targets(targets, Multilib::Lib32),
    MultilibPolicy::Lib64 => filter_multilib_targets(targets, Multilib::Lib64),
    MultilibPolicy::First => first_target(targets, [primary, secondary]),
    MultilibPolicy::FirstPrefer32 => first_target(targets, [Multilib::Lib32, Multilib::Lib64]),
    MultilibPolicy::Prefer32 => {
      let lib32 = filter_multilib_targets(targets, Multilib::Lib32);
      if lib32.is_empty() {
        filter_multilib_targets(targets, Multilib::Lib64)
      } else {
        lib32
      }
    }
    MultilibPolicy::DarwinUniversal => {
      // Reversed so the first variant can depend on the second.
      let mut lib64 = filter_multilib_targets(targets, Multilib::Lib64);
      lib64.reverse();
      lib64
    }
  })
}
