//! Product configuration and the target builder.
//!
//! `ProductVariables` mirrors the product-variable JSON handed to the build.
//! `Config` is built from it once per build invocation and is read-only
//! afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::arch::{ArchType, Multilib, decode_arch};
use crate::error::PlatformError;
use crate::os::{OsClass, OsType};
use crate::target::Target;

/// Configured targets per OS, in registry order.
pub type TargetMap = BTreeMap<OsType, Vec<Target>>;

/// Architecture selections from the product configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProductVariables {
  pub host_arch: Option<String>,
  pub host_secondary_arch: Option<String>,

  pub cross_host: Option<String>,
  pub cross_host_arch: Option<String>,
  pub cross_host_secondary_arch: Option<String>,

  pub device_arch: Option<String>,
  pub device_arch_variant: Option<String>,
  pub device_cpu_variant: Option<String>,
  pub device_abi: Vec<String>,

  pub device_secondary_arch: Option<String>,
  pub device_secondary_arch_variant: Option<String>,
  pub device_secondary_cpu_variant: Option<String>,
  pub device_secondary_abi: Vec<String>,

  pub native_bridge_arch: Option<String>,
  pub native_bridge_arch_variant: Option<String>,
  pub native_bridge_cpu_variant: Option<String>,
  pub native_bridge_abi: Vec<String>,
  pub native_bridge_relative_path: Option<String>,

  pub native_bridge_secondary_arch: Option<String>,
  pub native_bridge_secondary_arch_variant: Option<String>,
  pub native_bridge_secondary_cpu_variant: Option<String>,
  pub native_bridge_secondary_abi: Vec<String>,
  pub native_bridge_secondary_relative_path: Option<String>,

  pub ignore_prefer32_on_device: Option<bool>,
}

/// Treats `Some("")` the same as `None`.
fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().filter(|v| !v.is_empty())
}

/// Per-target parameters collected before decoding.
struct TargetRequest<'a> {
  os: OsType,
  arch: &'a str,
  arch_variant: Option<&'a str>,
  cpu_variant: Option<&'a str>,
  abi: &'a [String],
  native_bridge: Option<NativeBridge<'a>>,
}

struct NativeBridge<'a> {
  host_arch_name: &'a str,
  relative_path: Option<&'a str>,
}

impl<'a> TargetRequest<'a> {
  fn plain(os: OsType, arch: &'a str) -> Self {
    Self {
      os,
      arch,
      arch_variant: None,
      cpu_variant: None,
      abi: &[],
      native_bridge: None,
    }
  }
}

struct TargetBuilder<'a> {
  build_os: OsType,
  host_arch: &'a str,
  host_secondary_arch: Option<&'a str>,
  targets: TargetMap,
}

impl<'a> TargetBuilder<'a> {
  fn add(&mut self, request: TargetRequest<'_>) -> Result<(), PlatformError> {
    let arch = decode_arch(
      request.os,
      request.arch,
      request.arch_variant,
      request.cpu_variant,
      request.abi,
    )?;

    if !request.os.supports_arch(arch.arch_type) {
      return Err(PlatformError::UnsupportedArch {
        os: request.os.name().to_string(),
        arch: arch.arch_type.name().to_string(),
      });
    }

    let host_cross = self.is_host_cross(request.os, arch.arch_type);

    let mut target = Target::new(request.os, arch);
    target.host_cross = host_cross;
    if let Some(bridge) = request.native_bridge {
      target.native_bridge = true;
      target.native_bridge_host_arch_name = bridge.host_arch_name.to_string();
      target.native_bridge_relative_path = bridge.relative_path.unwrap_or_default().to_string();
    }

    debug!(target = %target, host_cross, "configured target");
    self.targets.entry(request.os).or_default().push(target);
    Ok(())
  }

  /// A host target is cross unless its OS runs on the build machine and its
  /// arch is one of the configured host arches.
  fn is_host_cross(&self, os: OsType, arch_type: ArchType) -> bool {
    if os.class() != OsClass::Host {
      return false;
    }

    let os_supported = os == self.build_os || (os.is_linux() && self.build_os.is_linux());
    let arch_supported = arch_type == ArchType::Common
      || arch_type.name() == self.host_arch
      || self.host_secondary_arch == Some(arch_type.name());

    !(os_supported && arch_supported)
  }
}

/// Convert product variables into the targets available to the build.
///
/// # Errors
///
/// Fails if no primary host arch is configured, if a cross host is requested
/// without its own primary arch, if the cross host OS is unknown, or if any
/// arch selection does not decode.
pub fn decode_targets(build_os: OsType, vars: &ProductVariables) -> Result<TargetMap, PlatformError> {
  let host_arch = non_empty(&vars.host_arch).ok_or(PlatformError::MissingHostArch)?;

  let mut builder = TargetBuilder {
    build_os,
    host_arch,
    host_secondary_arch: non_empty(&vars.host_secondary_arch),
    targets: TargetMap::new(),
  };

  // The primary host target always exists.
  builder.add(TargetRequest::plain(build_os, host_arch))?;

  if let Some(arch) = non_empty(&vars.host_secondary_arch) {
    builder.add(TargetRequest::plain(build_os, arch))?;
  }

  // Cross-compiled host targets, generally windows.
  if let Some(cross_host) = non_empty(&vars.cross_host) {
    let os = OsType::by_name(cross_host)
      .filter(|os| os.class() == OsClass::Host)
      .ok_or_else(|| PlatformError::UnknownOs(cross_host.to_string()))?;
    let arch = non_empty(&vars.cross_host_arch).ok_or(PlatformError::MissingCrossHostArch)?;
    builder.add(TargetRequest::plain(os, arch))?;

    if let Some(arch) = non_empty(&vars.cross_host_secondary_arch) {
      builder.add(TargetRequest::plain(os, arch))?;
    }
  }

  if let Some(device_arch) = non_empty(&vars.device_arch) {
    builder.add(TargetRequest {
      os: OsType::Android,
      arch: device_arch,
      arch_variant: vars.device_arch_variant.as_deref(),
      cpu_variant: vars.device_cpu_variant.as_deref(),
      abi: &vars.device_abi,
      native_bridge: None,
    })?;

    let secondary_arch = non_empty(&vars.device_secondary_arch);
    if let Some(arch) = secondary_arch {
      builder.add(TargetRequest {
        os: OsType::Android,
        arch,
        arch_variant: vars.device_secondary_arch_variant.as_deref(),
        cpu_variant: vars.device_secondary_cpu_variant.as_deref(),
        abi: &vars.device_secondary_abi,
        native_bridge: None,
      })?;
    }

    if let Some(arch) = non_empty(&vars.native_bridge_arch) {
      builder.add(TargetRequest {
        os: OsType::Android,
        arch,
        arch_variant: vars.native_bridge_arch_variant.as_deref(),
        cpu_variant: vars.native_bridge_cpu_variant.as_deref(),
        abi: &vars.native_bridge_abi,
        native_bridge: Some(NativeBridge {
          host_arch_name: device_arch,
          relative_path: vars.native_bridge_relative_path.as_deref(),
        }),
      })?;
    }

    if let (Some(host_arch_name), Some(arch)) = (secondary_arch, non_empty(&vars.native_bridge_secondary_arch)) {
      builder.add(TargetRequest {
        os: OsType::Android,
        arch,
        arch_variant: vars.native_bridge_secondary_arch_variant.as_deref(),
        cpu_variant: vars.native_bridge_secondary_cpu_variant.as_deref(),
        abi: &vars.native_bridge_secondary_abi,
        native_bridge: Some(NativeBridge {
          host_arch_name,
          relative_path: vars.native_bridge_secondary_relative_path.as_deref(),
        }),
      })?;
    }
  }

  Ok(builder.targets)
}

/// Read-only build configuration shared by every module.
#[derive(Debug, Clone)]
pub struct Config {
  build_os: OsType,
  targets: TargetMap,
  ignore_prefer32_on_device: bool,
}

impl Config {
  /// Build the configuration, running the target builder.
  pub fn new(build_os: OsType, vars: &ProductVariables) -> Result<Self, PlatformError> {
    let targets = decode_targets(build_os, vars)?;
    info!(
      build_os = %build_os,
      os_count = targets.len(),
      target_count = targets.values().map(Vec::len).sum::<usize>(),
      "decoded build targets"
    );
    Ok(Self {
      build_os,
      targets,
      ignore_prefer32_on_device: vars.ignore_prefer32_on_device.unwrap_or(false),
    })
  }

  /// Build the configuration for the OS this process runs on.
  pub fn for_current_os(vars: &ProductVariables) -> Result<Self, PlatformError> {
    Self::new(OsType::current(), vars)
  }

  pub fn build_os(&self) -> OsType {
    self.build_os
  }

  /// Targets configured for `os`, empty if none.
  pub fn targets(&self, os: OsType) -> &[Target] {
    self.targets.get(&os).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn all_targets(&self) -> &TargetMap {
    &self.targets
  }

  pub fn ignore_prefer32_on_device(&self) -> bool {
    self.ignore_prefer32_on_device
  }

  /// `true` if any device target is 64-bit.
  pub fn android_64(&self) -> bool {
    self
      .targets(OsType::Android)
      .iter()
      .any(|t| t.multilib() == Some(Multilib::Lib64))
  }

  /// Arch type of the first device target.
  pub fn device_primary_arch_type(&self) -> Option<ArchType> {
    self.targets(OsType::Android).first().map(Target::arch_type)
  }

  /// `true` if any device target is arm or arm64.
  pub fn has_arm_device_arch(&self) -> bool {
    self
      .targets(OsType::Android)
      .iter()
      .any(|t| matches!(t.arch_type(), ArchType::Arm | ArchType::Arm64))
  }
}
