//! The `arch` transition: one variant per selected target of the variant's OS.

use std::collections::HashMap;

use archsplit_platform::{ArchType, OsType, Target};

use crate::graph::DependencyTag;
use crate::module::ImageVariation;
use crate::multilib::{MultilibPolicy, decode_multilib, decode_multilib_targets, filter_host_cross};

use super::{MutateContext, Split, SplitContext, TransitionContext, TransitionMutator};

/// Split state of one module.
#[derive(Debug, Default)]
pub struct ArchInfo {
  pub targets: HashMap<String, Target>,
  pub multi_targets: Vec<Target>,
  pub primary: String,
  /// Resolved multilib policy.
  pub multilib: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ArchTransitionMutator;

impl TransitionMutator for ArchTransitionMutator {
  type State = ArchInfo;

  fn name(&self) -> &'static str {
    "arch"
  }

  fn split(&self, ctx: &mut SplitContext<'_>) -> Split<ArchInfo> {
    let module = ctx.module();
    let config = ctx.config();
    let caps = module.capabilities();

    // Arch splitting never applies to the combined-OS variant.
    let os = match module.os() {
      Some(os) if caps.arch_specific && os != OsType::CommonOs => os,
      _ => return Split::unnamed(),
    };

    let mut os_targets = config.targets(os).to_vec();

    if !(caps.native_bridge_supported && caps.image_variation == ImageVariation::Core) {
      os_targets.retain(|t| !t.native_bridge);
    }

    if caps.host_supported && !caps.host_cross_supported {
      os_targets.retain(|t| !t.host_cross);
    }

    // Ramdisk-like partitions only hold the primary device arch.
    if os == OsType::Android && caps.install_location.primary_arch_only() {
      os_targets.truncate(1);
    }

    let prefer_lib32 = os == OsType::Windows;
    let (multilib, extra_multilib) = decode_multilib(module, config);

    let mut targets = match decode_multilib_targets(&multilib, &os_targets, prefer_lib32) {
      Ok(targets) => targets,
      Err(error) => {
        ctx.error(error);
        Vec::new()
      }
    };
    if targets.is_empty() {
      ctx.disable();
      return Split::unnamed();
    }

    let mut multi_targets = Vec::new();
    if !extra_multilib.is_empty() {
      match decode_multilib_targets(&extra_multilib, &os_targets, prefer_lib32) {
        Ok(extra) => multi_targets = filter_host_cross(extra, targets[0].host_cross),
        Err(error) => ctx.error(error),
      }
    }

    if caps.image_variation == ImageVariation::Recovery {
      let primary = config.device_primary_arch_type();
      let allowed = |t: &Target| t.arch_type() == ArchType::Common || Some(t.arch_type()) == primary;
      targets.retain(allowed);
      multi_targets.retain(allowed);
    }

    if targets.is_empty() {
      ctx.disable();
      return Split::unnamed();
    }

    let variations: Vec<String> = targets.iter().map(Target::arch_variation).collect();
    let info = ArchInfo {
      targets: variations.iter().cloned().zip(targets).collect(),
      multi_targets,
      primary: variations[0].clone(),
      multilib,
    };
    Split { variations, state: info }
  }

  fn outgoing_transition(&self, ctx: &TransitionContext<'_>, variation: &str) -> String {
    if ctx.module().capabilities().arch_specific {
      variation.to_string()
    } else {
      String::new()
    }
  }

  fn incoming_transition(&self, ctx: &TransitionContext<'_>, requested: &str) -> String {
    let module = ctx.module();
    if !module.capabilities().arch_specific || module.os() == Some(OsType::CommonOs) {
      return String::new();
    }
    // Common-style modules only have the `common` variant; every arch reaches it.
    let (multilib, _) = decode_multilib(module, ctx.config());
    if multilib == MultilibPolicy::Common.as_str() {
      return "common".to_string();
    }
    requested.to_string()
  }

  fn mutate(&self, ctx: &mut MutateContext<'_>, variation: &str, state: &ArchInfo) {
    if ctx.module().os() == Some(OsType::CommonOs) {
      ctx.module_mut().set_target(Target::common(OsType::CommonOs), Vec::new(), true);
      return;
    }
    if variation.is_empty() {
      return;
    }

    let Some(target) = state.targets.get(variation) else {
      panic!("arch variation {variation:?} was not produced by split");
    };
    let config = ctx.config();

    ctx
      .module_mut()
      .set_target(target.clone(), state.multi_targets.clone(), variation == state.primary);
    if let Err(error) = ctx.module_mut().squash_arch(config) {
      ctx.error(error);
    }

    // Install tooling does not handle darwin host-cross targets.
    if target.os == OsType::Darwin && target.host_cross {
      ctx.module_mut().set_skip_install();
    }

    // Keyed on the configured primary darwin arch, not on `is_primary()`: the
    // reversed universal order makes the primary arch the second variant.
    let darwin = config.targets(OsType::Darwin);
    if state.multilib == MultilibPolicy::DarwinUniversal.as_str()
      && state.targets.len() == 2
      && darwin.len() > 1
      && target.os == OsType::Darwin
      && target.arch_type() == darwin[0].arch_type()
    {
      let name = ctx.module().name().to_string();
      ctx.add_variation_dependency(
        vec![("arch", darwin[1].arch_variation())],
        DependencyTag::DarwinUniversalVariant,
        name,
      );
    }
  }
}
