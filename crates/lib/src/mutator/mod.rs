//! Transition mutators and the phase driver.
//!
//! A transition mutator runs in barriered steps over the whole graph:
//! 1. `split` every variant into the variation names it needs
//! 2. clone the variants, one per variation
//! 3. carry existing edges over through the outgoing/incoming transitions
//! 4. `mutate` every new variant with the state its split produced
//! 5. resolve the dependencies added during mutate
//!
//! Split and mutate run in parallel with rayon. They only see their own
//! module and the read-only configuration.

pub mod arch;
pub mod os;

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, info};

use archsplit_platform::Config;

use crate::error::{ModuleError, VariantError};
use crate::graph::{DependencyTag, GraphParts, ModuleGraph, report};
use crate::module::Module;

pub use arch::{ArchInfo, ArchTransitionMutator};
pub use os::{OsInfo, OsTransitionMutator};

/// Result of splitting one module.
#[derive(Debug)]
pub struct Split<S> {
  /// Variation names in creation order. Never empty; `[""]` means the
  /// module is passed through unsplit.
  pub variations: Vec<String>,
  /// State handed to `mutate` for each of the new variants.
  pub state: S,
}

impl<S: Default> Split<S> {
  /// A single unnamed variation.
  pub fn unnamed() -> Self {
    Self {
      variations: vec![String::new()],
      state: S::default(),
    }
  }
}

/// What a split step may see and do.
pub struct SplitContext<'a> {
  module: &'a Module,
  config: &'a Config,
  disabled: bool,
  errors: Vec<VariantError>,
}

impl<'a> SplitContext<'a> {
  fn new(module: &'a Module, config: &'a Config) -> Self {
    Self {
      module,
      config,
      disabled: false,
      errors: Vec::new(),
    }
  }

  pub fn module(&self) -> &'a Module {
    self.module
  }

  pub fn config(&self) -> &'a Config {
    self.config
  }

  /// Disable every variant created from this split.
  pub fn disable(&mut self) {
    self.disabled = true;
  }

  pub fn error(&mut self, error: impl Into<VariantError>) {
    self.errors.push(error.into());
  }
}

/// What an incoming or outgoing transition may see.
pub struct TransitionContext<'a> {
  module: &'a Module,
  config: &'a Config,
}

impl<'a> TransitionContext<'a> {
  pub fn module(&self) -> &'a Module {
    self.module
  }

  pub fn config(&self) -> &'a Config {
    self.config
  }
}

/// A dependency added during mutate, resolved once all variants exist.
#[derive(Debug, Clone)]
struct AddedDependency {
  variations: Vec<(&'static str, String)>,
  tag: DependencyTag,
  name: String,
}

/// What a mutate step may see and do.
pub struct MutateContext<'a> {
  module: &'a mut Module,
  config: &'a Config,
  deps: Vec<AddedDependency>,
  errors: Vec<VariantError>,
}

impl<'a> MutateContext<'a> {
  pub fn module(&self) -> &Module {
    &*self.module
  }

  pub fn module_mut(&mut self) -> &mut Module {
    &mut *self.module
  }

  pub fn config(&self) -> &'a Config {
    self.config
  }

  /// Depend on the variant of `name` whose variations are this variant's,
  /// with `variations` replacing or adding entries.
  pub fn add_variation_dependency(
    &mut self,
    variations: Vec<(&'static str, String)>,
    tag: DependencyTag,
    name: impl Into<String>,
  ) {
    self.deps.push(AddedDependency {
      variations,
      tag,
      name: name.into(),
    });
  }

  pub fn error(&mut self, error: impl Into<VariantError>) {
    self.errors.push(error.into());
  }
}

/// A graph-rewriting stage that splits modules into variants.
pub trait TransitionMutator: Send + Sync {
  /// Per-module state passed from `split` to `mutate`.
  type State: Default + Send + Sync;

  /// Variation key recorded on every variant, e.g. `os`.
  fn name(&self) -> &'static str;

  fn split(&self, ctx: &mut SplitContext<'_>) -> Split<Self::State>;

  /// Variation requested from a dependency by a variant that has `variation`.
  fn outgoing_transition(&self, _ctx: &TransitionContext<'_>, variation: &str) -> String {
    variation.to_string()
  }

  /// Variation of the dependency that satisfies a `requested` variation.
  fn incoming_transition(&self, _ctx: &TransitionContext<'_>, requested: &str) -> String {
    requested.to_string()
  }

  fn mutate(&self, ctx: &mut MutateContext<'_>, variation: &str, state: &Self::State);
}

/// One step of the engine's ordered phase list.
pub trait Phase: Send + Sync {
  fn name(&self) -> &'static str;

  fn apply(&self, graph: ModuleGraph, config: &Config) -> ModuleGraph;
}

impl<M: TransitionMutator> Phase for M {
  fn name(&self) -> &'static str {
    TransitionMutator::name(self)
  }

  fn apply(&self, graph: ModuleGraph, config: &Config) -> ModuleGraph {
    run_transition(self, graph, config)
  }
}

struct SplitOutcome<S> {
  split: Split<S>,
  disabled: bool,
  errors: Vec<VariantError>,
}

fn run_transition<M: TransitionMutator>(mutator: &M, graph: ModuleGraph, config: &Config) -> ModuleGraph {
  let phase = TransitionMutator::name(mutator);
  let GraphParts {
    modules,
    edges,
    mut errors,
  } = graph.into_parts();

  info!(phase, modules = modules.len(), "starting transition");

  let outcomes: Vec<SplitOutcome<M::State>> = modules
    .par_iter()
    .map(|module| {
      let mut ctx = SplitContext::new(module, config);
      let split = mutator.split(&mut ctx);
      SplitOutcome {
        split,
        disabled: ctx.disabled,
        errors: ctx.errors,
      }
    })
    .collect();

  // Create the variants. Variants of one module are contiguous and keep the
  // order their split returned.
  let mut variants = Vec::new();
  let mut origin = Vec::new();
  let mut created: Vec<Vec<usize>> = Vec::with_capacity(modules.len());
  let mut states = Vec::with_capacity(modules.len());

  for (idx, (module, outcome)) in modules.iter().zip(outcomes).enumerate() {
    errors.extend(outcome.errors.into_iter().map(|e| report(module, e)));

    let mut variations = outcome.split.variations;
    if variations.is_empty() {
      variations.push(String::new());
    }
    if outcome.disabled {
      debug!(phase, module = %module.name(), "module disabled");
    }
    debug!(phase, module = %module.name(), variations = ?variations, "split module");

    let mut indices = Vec::with_capacity(variations.len());
    for variation in variations {
      let mut variant = module.clone();
      variant.push_variation(phase, variation);
      if outcome.disabled {
        variant.disable();
      }
      indices.push(variants.len());
      origin.push(idx);
      variants.push(variant);
    }
    created.push(indices);
    states.push(outcome.split.state);
  }

  let mut new_edges = rewire_edges(mutator, &modules, &variants, &created, edges, config, &mut errors);

  let added: Vec<(Vec<AddedDependency>, Vec<VariantError>)> = variants
    .par_iter_mut()
    .zip(origin.par_iter())
    .map(|(variant, &idx)| {
      let variation = variant.variation(phase).to_string();
      let mut ctx = MutateContext {
        module: variant,
        config,
        deps: Vec::new(),
        errors: Vec::new(),
      };
      mutator.mutate(&mut ctx, &variation, &states[idx]);
      (ctx.deps, ctx.errors)
    })
    .collect();

  let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
  for (idx, variant) in variants.iter().enumerate() {
    groups.entry(variant.name()).or_default().push(idx);
  }

  for (from, (deps, mutate_errors)) in added.into_iter().enumerate() {
    let variant = &variants[from];
    errors.extend(mutate_errors.into_iter().map(|e| report(variant, e)));

    for dep in deps {
      match resolve_added(&variants, &groups, from, &dep) {
        Ok(to) => new_edges.push((from, to, dep.tag)),
        Err(error) => errors.push(report(variant, error)),
      }
    }
  }

  info!(phase, variants = variants.len(), edges = new_edges.len(), "finished transition");

  ModuleGraph::from_parts(GraphParts {
    modules: variants,
    edges: new_edges,
    errors,
  })
}

/// Carry the edges of the split modules over to their variants.
///
/// `common_os` edges fan out to every variant of their target; other edges
/// follow the transitions and fail when no variant has the resulting
/// variation.
fn rewire_edges<M: TransitionMutator>(
  mutator: &M,
  modules: &[Module],
  variants: &[Module],
  created: &[Vec<usize>],
  edges: Vec<(usize, usize, DependencyTag)>,
  config: &Config,
  errors: &mut Vec<ModuleError>,
) -> Vec<(usize, usize, DependencyTag)> {
  let phase = TransitionMutator::name(mutator);
  let mut rewired = Vec::with_capacity(edges.len());

  for (from, to, tag) in edges {
    let targets = &created[to];

    for &source in &created[from] {
      if tag == DependencyTag::CommonOsToOsSpecific {
        rewired.extend(targets.iter().map(|&target| (source, target, tag.clone())));
        continue;
      }

      let outgoing_ctx = TransitionContext {
        module: &variants[source],
        config,
      };
      let requested = mutator.outgoing_transition(&outgoing_ctx, variants[source].variation(phase));
      let incoming_ctx = TransitionContext {
        module: &modules[to],
        config,
      };
      let wanted = mutator.incoming_transition(&incoming_ctx, &requested);

      match targets.iter().find(|&&t| variants[t].variation(phase) == wanted) {
        Some(&target) => rewired.push((source, target, tag.clone())),
        None => errors.push(report(
          &variants[source],
          VariantError::MissingVariant {
            dependency: modules[to].name().to_string(),
            variation: wanted,
          },
        )),
      }
    }
  }

  rewired
}

fn resolve_added(
  variants: &[Module],
  groups: &HashMap<&str, Vec<usize>>,
  from: usize,
  dep: &AddedDependency,
) -> Result<usize, VariantError> {
  let mut requested: Vec<(&str, String)> = variants[from]
    .variations()
    .iter()
    .map(|(name, value)| (*name, value.clone()))
    .collect();
  for (name, value) in &dep.variations {
    match requested.iter_mut().find(|(n, _)| n == name) {
      Some(entry) => entry.1 = value.clone(),
      None => requested.push((*name, value.clone())),
    }
  }

  let rendered = requested
    .iter()
    .filter(|(_, v)| !v.is_empty())
    .map(|(n, v)| format!("{n}:{v}"))
    .collect::<Vec<_>>()
    .join(",");

  let to = groups
    .get(dep.name.as_str())
    .ok_or_else(|| VariantError::UnknownDependency(dep.name.clone()))?
    .iter()
    .copied()
    .find(|&i| variants[i].matches_variations(&requested))
    .ok_or_else(|| VariantError::MissingVariant {
      dependency: dep.name.clone(),
      variation: rendered.clone(),
    })?;

  // Siblings may only depend on variants created before them.
  if dep.name == variants[from].name() && to >= from {
    return Err(VariantError::LaterVariant {
      dependency: dep.name.clone(),
      variation: rendered,
    });
  }
  Ok(to)
}
