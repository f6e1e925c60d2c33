//! The variant graph.
//!
//! Holds every module variant in creation order together with the dependency
//! edges between variants. Node `i` of the underlying petgraph graph is
//! always `modules[i]`; edges point from the dependent variant to its
//! dependency.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::warn;

use crate::error::{EngineError, ModuleError, VariantError};
use crate::module::{Module, ModuleDecl};
use crate::props::SchemaCache;

/// Relation carried by a dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyTag {
  /// A dependency declared by the module, with the declarer's tag.
  Declared(String),
  /// From a module's `common_os` variant to each of its per-OS variants.
  CommonOsToOsSpecific,
  /// From the primary Darwin universal variant to the secondary arch variant.
  DarwinUniversalVariant,
}

/// A module variant and the edges leaving it.
#[derive(Debug)]
pub struct ModuleGraph {
  modules: Vec<Module>,
  graph: DiGraph<String, DependencyTag>,
  /// Variant indices per module name, in creation order.
  groups: HashMap<String, Vec<usize>>,
  errors: Vec<ModuleError>,
}

/// Raw pieces a phase takes apart and reassembles.
pub(crate) struct GraphParts {
  pub modules: Vec<Module>,
  pub edges: Vec<(usize, usize, DependencyTag)>,
  pub errors: Vec<ModuleError>,
}

/// Attribute `error` to `module` and log it.
pub(crate) fn report(module: &Module, error: VariantError) -> ModuleError {
  let variations = module.variations_string();
  warn!(module = %module.name(), variations = %variations, error = %error, "module error");
  ModuleError {
    module: module.name().to_string(),
    variations,
    error,
  }
}

impl ModuleGraph {
  /// Build the initial graph: one variant per declaration, with declared
  /// dependencies resolved by name.
  ///
  /// Property errors and unknown dependencies are recorded against the
  /// module; a module whose properties fail to load is disabled.
  ///
  /// # Errors
  ///
  /// Returns `DuplicateModule` if two declarations share a name.
  pub fn new(decls: Vec<ModuleDecl>, cache: &SchemaCache) -> Result<Self, EngineError> {
    let mut by_name = HashMap::new();
    for (idx, decl) in decls.iter().enumerate() {
      if by_name.insert(decl.name.clone(), idx).is_some() {
        return Err(EngineError::DuplicateModule(decl.name.clone()));
      }
    }

    let mut modules = Vec::with_capacity(decls.len());
    let mut edges = Vec::new();
    let mut errors = Vec::new();

    for (idx, decl) in decls.into_iter().enumerate() {
      let mut module = Module::new(decl.name, decl.capabilities, decl.multilib);
      if let Err(error) = module.init_properties(decl.properties, cache) {
        module.disable();
        errors.push(report(&module, error.into()));
      }

      for dep in decl.deps {
        match by_name.get(&dep.name) {
          Some(&target) => edges.push((idx, target, DependencyTag::Declared(dep.tag))),
          None => errors.push(report(&module, VariantError::UnknownDependency(dep.name))),
        }
      }
      modules.push(module);
    }

    Ok(Self::from_parts(GraphParts { modules, edges, errors }))
  }

  pub(crate) fn from_parts(parts: GraphParts) -> Self {
    let mut graph = DiGraph::with_capacity(parts.modules.len(), parts.edges.len());
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();

    for (idx, module) in parts.modules.iter().enumerate() {
      let label = match module.variations_string() {
        v if v.is_empty() => module.name().to_string(),
        v => format!("{}{{{v}}}", module.name()),
      };
      graph.add_node(label);
      groups.entry(module.name().to_string()).or_default().push(idx);
    }
    for (from, to, tag) in parts.edges {
      graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), tag);
    }

    Self {
      modules: parts.modules,
      graph,
      groups,
      errors: parts.errors,
    }
  }

  pub(crate) fn into_parts(self) -> GraphParts {
    let edges = self
      .graph
      .edge_references()
      .map(|e| (e.source().index(), e.target().index(), e.weight().clone()))
      .collect();
    GraphParts {
      modules: self.modules,
      edges,
      errors: self.errors,
    }
  }

  /// All variants in creation order.
  pub fn modules(&self) -> &[Module] {
    &self.modules
  }

  pub fn module(&self, idx: usize) -> &Module {
    &self.modules[idx]
  }

  pub fn len(&self) -> usize {
    self.modules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.modules.is_empty()
  }

  /// Indices of the variants of module `name`, in creation order.
  pub fn variant_indices(&self, name: &str) -> &[usize] {
    self.groups.get(name).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Variants of module `name`, in creation order.
  pub fn variants(&self, name: &str) -> Vec<&Module> {
    self.variant_indices(name).iter().map(|&i| &self.modules[i]).collect()
  }

  /// Index of the variant of `name` with exactly the given variations.
  pub fn find<S: AsRef<str>>(&self, name: &str, variations: &[(&str, S)]) -> Option<usize> {
    self
      .variant_indices(name)
      .iter()
      .copied()
      .find(|&i| self.modules[i].matches_variations(variations))
  }

  /// The variant of `name` with exactly the given variations.
  pub fn variant<S: AsRef<str>>(&self, name: &str, variations: &[(&str, S)]) -> Option<&Module> {
    self.find(name, variations).map(|i| &self.modules[i])
  }

  /// Direct dependencies of variant `idx` as `(dependency index, tag)`, ordered
  /// by dependency index.
  pub fn dependencies(&self, idx: usize) -> Vec<(usize, &DependencyTag)> {
    let mut deps: Vec<_> = self
      .graph
      .edges(NodeIndex::new(idx))
      .map(|e| (e.target().index(), e.weight()))
      .collect();
    deps.sort_by_key(|(target, _)| *target);
    deps
  }

  /// Module errors recorded so far.
  pub fn errors(&self) -> &[ModuleError] {
    &self.errors
  }

  /// Fail if any module error was recorded.
  pub fn check(&self) -> Result<(), EngineError> {
    if self.errors.is_empty() {
      Ok(())
    } else {
      Err(EngineError::Modules(self.errors.clone()))
    }
  }
}
