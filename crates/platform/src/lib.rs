//! Architecture and OS registries for archsplit
//!
//! This crate provides the build-time constant data the variant engine works
//! against:
//! - `ArchType` / `OsType` registries with their variant and feature tables
//! - `Arch` and `Target` value types
//! - `ProductVariables` and the target builder producing a `Config`

mod arch;
mod config;
mod error;
mod os;
mod target;

pub use arch::{Arch, ArchType, Multilib, decode_arch};
pub use config::{Config, ProductVariables, TargetMap, decode_targets};
pub use error::PlatformError;
pub use os::{OsClass, OsType};
pub use target::Target;
