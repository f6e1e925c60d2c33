//! Error types for archsplit-platform

use thiserror::Error;

/// Errors raised while decoding architectures or building the target list.
///
/// Every variant is fatal to the build: the product configuration is
/// malformed and no module can be expanded against it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
  #[error("unknown arch {0:?}")]
  UnknownArch(String),

  #[error("[{arch:?}] unknown arch variant {variant:?}, supported variants: {supported:?}")]
  UnknownArchVariant {
    arch: String,
    variant: String,
    supported: Vec<&'static str>,
  },

  #[error("[{arch:?}] unknown cpu variant {variant:?}, supported variants: {supported:?}")]
  UnknownCpuVariant {
    arch: String,
    variant: String,
    supported: Vec<&'static str>,
  },

  #[error("arch {arch:?} is not supported on os {os:?}")]
  UnsupportedArch { os: String, arch: String },

  #[error("unknown cross host OS {0:?}")]
  UnknownOs(String),

  #[error("no host primary architecture set")]
  MissingHostArch,

  #[error("no cross-host primary architecture set")]
  MissingCrossHostArch,
}
