//! archsplit-lib: variant expansion and property specialization
//!
//! This crate turns modules declared once into their per-OS and per-arch
//! variants:
//! - `props`: configuration fragments, override schemas and squashing
//! - `multilib`: which configured targets a module is built for
//! - `mutator`: the `os` and `arch` transition phases
//! - `graph`: the resulting variant graph
//! - `Engine`: the driver owning configuration, schema cache and phases

pub mod engine;
pub mod error;
pub mod graph;
pub mod module;
pub mod multilib;
pub mod mutator;
pub mod props;

pub use engine::Engine;
pub use error::{EngineError, ModuleError, PropertyError, VariantError};
pub use graph::{DependencyTag, ModuleGraph};
pub use module::{
  Capabilities, DependencyDecl, ImageVariation, InstallLocation, Module, ModuleDecl, MultilibProperties, PropertySet,
};
pub use multilib::{MultilibPolicy, decode_multilib, decode_multilib_targets};
