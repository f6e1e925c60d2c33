//! Top-level driver: configuration, schema cache and the ordered phase list.

use tracing::info;

use archsplit_platform::{Config, OsType, ProductVariables};

use crate::error::EngineError;
use crate::graph::ModuleGraph;
use crate::module::ModuleDecl;
use crate::mutator::{ArchTransitionMutator, OsTransitionMutator, Phase};
use crate::props::SchemaCache;

/// One build invocation of the variant engine.
pub struct Engine {
  config: Config,
  schemas: SchemaCache,
  phases: Vec<Box<dyn Phase>>,
}

impl Engine {
  /// Run the target builder for `build_os` and set up the default phases.
  ///
  /// # Errors
  ///
  /// Returns `EngineError::Platform` if the product variables do not describe
  /// a valid set of targets.
  pub fn new(build_os: OsType, vars: &ProductVariables) -> Result<Self, EngineError> {
    Ok(Self::with_config(Config::new(build_os, vars)?))
  }

  /// Use an already built configuration with the default phases: `os`, then
  /// `arch`.
  pub fn with_config(config: Config) -> Self {
    Self {
      config,
      schemas: SchemaCache::new(),
      phases: vec![Box::new(OsTransitionMutator), Box::new(ArchTransitionMutator)],
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn schemas(&self) -> &SchemaCache {
    &self.schemas
  }

  /// Names of the phases, in the order they run.
  pub fn phase_names(&self) -> Vec<&'static str> {
    self.phases.iter().map(|p| p.name()).collect()
  }

  /// Expand `modules` into their variants.
  ///
  /// Module-scoped problems are recorded in the returned graph; call
  /// `ModuleGraph::check` to turn them into an error.
  ///
  /// # Errors
  ///
  /// Returns `DuplicateModule` if two modules share a name.
  pub fn run(&self, modules: Vec<ModuleDecl>) -> Result<ModuleGraph, EngineError> {
    info!(modules = modules.len(), phases = self.phases.len(), "expanding module variants");

    let mut graph = ModuleGraph::new(modules, &self.schemas)?;
    for phase in &self.phases {
      graph = phase.apply(graph, &self.config);
    }

    info!(
      variants = graph.len(),
      errors = graph.errors().len(),
      schemas = self.schemas.len(),
      "module variants expanded"
    );
    Ok(graph)
  }
}
