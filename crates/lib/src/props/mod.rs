//! Property specialization: fragments, override schemas and squashing.
//!
//! Module types declare their property structs as `FragmentType`s. For each
//! type the engine derives an override schema (`ArchPropTypeDesc`), fills the
//! module's `arch`/`multilib`/`target` values into per-shard override trees,
//! and squashes the slots matching a variant's OS and target into the
//! variant's effective properties.

pub mod fragment;
pub mod merge;
pub mod overrides;
pub mod schema;
pub mod squash;

pub use fragment::{FieldDecl, FieldKind, Fragment, FragmentType, MergeTag, Value};
pub use merge::{merge_fragment, validate_fragment};
pub use overrides::{OverrideScope, OverrideTree, PropertyOverrides};
pub use schema::{ArchPropTypeDesc, MAX_SHARD_UNITS, SchemaCache, SlotLayout, build_schema};
pub use squash::{arch_scopes, os_scopes, squash_arch, squash_os};
