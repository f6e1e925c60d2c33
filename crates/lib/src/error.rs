//! Error types for variant expansion.
//!
//! Errors come in three severities:
//! - `EngineError`: the build cannot proceed at all (bad product configuration).
//! - `ModuleError`: attributed to one variant; that variant is disabled and the
//!   rest of the graph keeps going.
//! - Invariant violations inside the engine itself panic.

use archsplit_platform::PlatformError;
use thiserror::Error;

/// Errors raised while validating or merging configuration fragments.
///
/// The string payload is always the user-facing dotted property name,
/// e.g. `arch.arm.cflags` or `target.android.srcs`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
  /// The fragment type declares no such field.
  #[error("unrecognized property {0:?}")]
  UnknownProperty(String),

  /// The field exists but may not be set inside `arch`/`multilib`/`target`.
  #[error("property {0:?} can not be set per architecture")]
  NotArchVariant(String),

  /// Value and declared field kind disagree.
  #[error("property {property:?} is a {found}, expected {expected}")]
  TypeMismatch {
    property: String,
    expected: &'static str,
    found: &'static str,
  },

  /// Override path that names no slot of the override schema.
  #[error("unknown override scope {0:?}")]
  UnknownScope(String),

  /// Overrides declared on a module that has no arch-specific variants.
  #[error("module is not architecture specific but sets {0:?}")]
  NotArchSpecific(String),
}

/// Errors attributed to a single module variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariantError {
  #[error(transparent)]
  Property(#[from] PropertyError),

  #[error(r#"compile_multilib must be "both", "first", "32", "64", "prefer32" or "first_prefer32" found {0:?}"#)]
  InvalidMultilib(String),

  /// A dependency resolved to a variation its target does not have.
  #[error("dependency {dependency:?} has no variant {variation:?}")]
  MissingVariant { dependency: String, variation: String },

  #[error("depends on undefined module {0:?}")]
  UnknownDependency(String),

  /// Inter-variant dependencies may only point at earlier siblings.
  #[error("dependency on variant {variation:?} of {dependency:?} which is created later")]
  LaterVariant { dependency: String, variation: String },
}

/// A `VariantError` together with the variant it was reported against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("module {module:?}{}: {error}", variant_suffix(.variations))]
pub struct ModuleError {
  pub module: String,
  /// Rendered variation list, e.g. `os:android,arch:arm64`.
  pub variations: String,
  pub error: VariantError,
}

fn variant_suffix(variations: &str) -> String {
  if variations.is_empty() {
    String::new()
  } else {
    format!(" variant {variations:?}")
  }
}

/// Errors that stop the whole build.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("invalid product configuration: {0}")]
  Platform(#[from] PlatformError),

  #[error("module {0:?} is defined more than once")]
  DuplicateModule(String),

  /// Raised by `ModuleGraph::check` once processing has finished.
  #[error("{} module error(s) reported", .0.len())]
  Modules(Vec<ModuleError>),
}
