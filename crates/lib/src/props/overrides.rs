//! Override scopes and the per-module override trees filled from them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use archsplit_platform::{ArchType, Multilib};

use crate::error::PropertyError;

use super::fragment::{Fragment, FragmentType};
use super::merge::{check_arch_variant, merge_fragment};
use super::schema::{ArchPropTypeDesc, SchemaCache, SlotLayout, field_name_for_property, variant_field_name};

/// One override slot, addressed by generated field names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverrideScope {
  /// `arch.<type>` or `arch.<type>.<variant>`.
  Arch {
    arch_type: ArchType,
    variant: Option<String>,
  },
  /// `multilib.lib32` / `multilib.lib64`.
  Multilib(Multilib),
  /// `target.<slot>`.
  Target(String),
}

impl OverrideScope {
  pub fn arch(arch_type: ArchType) -> Self {
    OverrideScope::Arch {
      arch_type,
      variant: None,
    }
  }

  /// Nested arch slot for a raw variant, cpu variant or feature name.
  pub fn arch_variant(arch_type: ArchType, variant: &str) -> Self {
    OverrideScope::Arch {
      arch_type,
      variant: Some(variant_field_name(variant)),
    }
  }

  /// Target slot from its generated field name, e.g. `Linux_glibc_x86_64`.
  pub fn target(field: impl Into<String>) -> Self {
    OverrideScope::Target(field.into())
  }

  /// `true` if the slot exists in `layout`.
  pub fn exists_in(&self, layout: &SlotLayout) -> bool {
    match self {
      OverrideScope::Arch { arch_type, variant } => layout.has_arch_slot(*arch_type, variant.as_deref()),
      OverrideScope::Multilib(_) => true,
      OverrideScope::Target(field) => layout.has_target_slot(field),
    }
  }
}

impl fmt::Display for OverrideScope {
  /// User-facing dotted path.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OverrideScope::Arch { arch_type, variant } => {
        write!(f, "arch.{}", arch_type.name())?;
        if let Some(variant) = variant {
          write!(f, ".{}", variant.to_lowercase())?;
        }
        Ok(())
      }
      OverrideScope::Multilib(multilib) => write!(f, "multilib.{multilib}"),
      OverrideScope::Target(field) => write!(f, "target.{}", field.to_lowercase()),
    }
  }
}

impl FromStr for OverrideScope {
  type Err = PropertyError;

  /// Parse `arch.arm`, `arch.arm.armv7-a-neon`, `multilib.lib32` or
  /// `target.linux_glibc_x86_64`. Only the shape is checked here; slot
  /// existence is checked against the schema layout.
  fn from_str(path: &str) -> Result<Self, Self::Err> {
    let unknown = || PropertyError::UnknownScope(path.to_string());
    let mut parts = path.splitn(3, '.');
    let (Some(kind), Some(name)) = (parts.next(), parts.next()) else {
      return Err(unknown());
    };
    let rest = parts.next();

    match (kind, rest) {
      ("arch", rest) => {
        let arch_type = ArchType::from_name(name).ok_or_else(unknown)?;
        Ok(OverrideScope::Arch {
          arch_type,
          variant: rest.map(variant_field_name),
        })
      }
      ("multilib", None) => Multilib::from_name(name).map(OverrideScope::Multilib).ok_or_else(unknown),
      ("target", None) if !name.is_empty() => Ok(OverrideScope::Target(field_name_for_property(name))),
      _ => Err(unknown()),
    }
  }
}

/// Override values of one shard, keyed by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideTree {
  slots: BTreeMap<OverrideScope, Fragment>,
}

impl OverrideTree {
  /// Non-empty override fragment for `scope`.
  pub fn get(&self, scope: &OverrideScope) -> Option<&Fragment> {
    self.slots.get(scope).filter(|f| !f.is_empty())
  }

  pub fn is_empty(&self) -> bool {
    self.slots.values().all(Fragment::is_empty)
  }

  fn fill(&mut self, shard: &FragmentType, scope: &OverrideScope, values: &Fragment) -> Result<(), PropertyError> {
    let slot = self.slots.entry(scope.clone()).or_default();
    merge_fragment(shard, slot, values, &scope.to_string())
  }
}

/// Override trees of one fragment type attached to a module: one tree per
/// schema shard.
#[derive(Debug, Clone)]
pub struct PropertyOverrides {
  fragment_type: Arc<FragmentType>,
  schema: Arc<[ArchPropTypeDesc]>,
  trees: Vec<OverrideTree>,
}

impl PropertyOverrides {
  /// Build the schema for `fragment_type` and distribute `raw` override
  /// values into per-shard trees.
  ///
  /// `raw` maps override paths such as `arch.arm` or `target.android` to the
  /// values set there.
  ///
  /// # Errors
  ///
  /// Fails on malformed or nonexistent override paths, on fields the type
  /// does not declare, and on fields not flagged `arch_variant`.
  pub fn new(
    fragment_type: Arc<FragmentType>,
    raw: &BTreeMap<String, Fragment>,
    cache: &SchemaCache,
  ) -> Result<Self, PropertyError> {
    // The schema must exist before any value is filled in.
    let schema = cache.get(&fragment_type);
    let mut trees = vec![OverrideTree::default(); schema.len()];

    for (path, values) in raw {
      let scope: OverrideScope = path.parse()?;
      if !scope.exists_in(cache.layout()) {
        return Err(PropertyError::UnknownScope(path.clone()));
      }
      check_arch_variant(&fragment_type, values, &scope.to_string())?;

      for (name, value) in values.iter() {
        let shard = schema
          .iter()
          .position(|desc| desc.contains_field(name))
          .ok_or_else(|| PropertyError::NotArchVariant(format!("{scope}.{name}")))?;
        let single = Fragment::new().with(name.clone(), value.clone());
        trees[shard].fill(schema[shard].shard(), &scope, &single)?;
      }
    }

    Ok(Self {
      fragment_type,
      schema,
      trees,
    })
  }

  pub fn fragment_type(&self) -> &FragmentType {
    &self.fragment_type
  }

  pub fn schema(&self) -> &[ArchPropTypeDesc] {
    &self.schema
  }

  pub fn trees(&self) -> &[OverrideTree] {
    &self.trees
  }
}
