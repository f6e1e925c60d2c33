//! The `os` transition: one variant per OS the module can be built for.

use std::collections::HashMap;

use archsplit_platform::OsType;

use crate::graph::DependencyTag;

use super::{MutateContext, Split, SplitContext, TransitionContext, TransitionMutator};

/// Split state of one module.
#[derive(Debug, Default)]
pub struct OsInfo {
  pub os_by_name: HashMap<String, OsType>,
  /// Variation names in creation order, `common_os` last if present.
  pub names: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsTransitionMutator;

impl TransitionMutator for OsTransitionMutator {
  type State = OsInfo;

  fn name(&self) -> &'static str {
    "os"
  }

  fn split(&self, ctx: &mut SplitContext<'_>) -> Split<OsInfo> {
    let module = ctx.module();
    let caps = module.capabilities();
    if !caps.arch_specific {
      return Split::unnamed();
    }

    let config = ctx.config();
    let mut info = OsInfo::default();
    let mut add = |os: OsType| {
      info.os_by_name.insert(os.name().to_string(), os);
      info.names.push(os.name().to_string());
    };

    for os in OsType::ALL {
      if os != OsType::CommonOs && config.targets(os).iter().any(|t| caps.supports_target(t)) {
        add(os);
      }
    }
    // Depends on every per-OS variant, so it is created after all of them.
    if caps.create_common_os_variant {
      add(OsType::CommonOs);
    }

    if info.names.is_empty() {
      ctx.disable();
      return Split::unnamed();
    }

    Split {
      variations: info.names.clone(),
      state: info,
    }
  }

  fn outgoing_transition(&self, ctx: &TransitionContext<'_>, variation: &str) -> String {
    if ctx.module().capabilities().arch_specific {
      variation.to_string()
    } else {
      String::new()
    }
  }

  fn incoming_transition(&self, ctx: &TransitionContext<'_>, requested: &str) -> String {
    if ctx.module().capabilities().arch_specific {
      requested.to_string()
    } else {
      String::new()
    }
  }

  fn mutate(&self, ctx: &mut MutateContext<'_>, variation: &str, state: &OsInfo) {
    if variation.is_empty() {
      return;
    }
    let Some(&os) = state.os_by_name.get(variation) else {
      panic!("os variation {variation:?} was not produced by split");
    };
    ctx.module_mut().set_os(os);

    if os == OsType::CommonOs {
      let name = ctx.module().name().to_string();
      for sibling in state.names.iter().filter(|n| n.as_str() != variation) {
        ctx.add_variation_dependency(
          vec![("os", sibling.clone())],
          DependencyTag::CommonOsToOsSpecific,
          name.clone(),
        );
      }
      return;
    }

    let config = ctx.config();
    if let Err(error) = ctx.module_mut().squash_os(config) {
      ctx.error(error);
    }
  }
}
