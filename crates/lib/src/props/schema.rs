//! Override schema generation.
//!
//! For every fragment type the engine derives which override slots exist:
//! `arch: { <type>: { .., <variant>: { .. } } }`, `multilib: { lib32, lib64 }`
//! and `target: { host, android, linux_glibc_x86_64, .. }`. Slots depend only
//! on the static registries, so a schema is a pure function of the fragment
//! type and can be shared by every module and thread once computed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use archsplit_platform::{ArchType, Multilib, OsType};
use tracing::debug;

use super::fragment::{FieldDecl, FragmentType};

/// Budget, in signature characters, for the fields of a single shard.
pub const MAX_SHARD_UNITS: usize = 500;

/// Fixed `target: { .. }` slots present for every fragment type.
const FIXED_TARGET_SLOTS: [&str; 12] = [
  "Host",
  "Android64",
  "Android32",
  "Bionic",
  "Glibc",
  "Musl",
  "Linux",
  "Host_linux",
  "Not_windows",
  "Arm_on_x86",
  "Arm_on_x86_64",
  "Native_bridge",
];

/// `-` and `.` are not valid in field names.
pub fn sanitize_variant(name: &str) -> String {
  name.replace(['-', '.'], "_")
}

/// Generated field name for a property name: the first letter is uppercased.
pub fn field_name_for_property(name: &str) -> String {
  let mut chars = name.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// Field name of the `arch: { <type>: { <variant>: .. } }` slot for a raw
/// arch variant, cpu variant or feature name.
pub fn variant_field_name(variant: &str) -> String {
  field_name_for_property(&sanitize_variant(variant))
}

/// `arch: { <type>: .. }` slot and its nested variant slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchSlot {
  pub arch_type: ArchType,
  /// Field names of nested slots: arch variants, then cpu variants, then
  /// features, without duplicates.
  pub variants: Vec<String>,
}

/// Slot layout shared by every fragment type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLayout {
  arch: Vec<ArchSlot>,
  target: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, name: String) {
  if !list.contains(&name) {
    list.push(name);
  }
}

impl SlotLayout {
  /// Derive the layout from the registries.
  pub fn new() -> Self {
    let arch = ArchType::ALL
      .iter()
      .map(|&arch_type| {
        let mut variants = Vec::new();
        let names = arch_type
          .arch_variants()
          .iter()
          .chain(arch_type.cpu_variants())
          .chain(arch_type.features());
        for name in names {
          push_unique(&mut variants, variant_field_name(name));
        }
        ArchSlot { arch_type, variants }
      })
      .collect();

    let mut target: Vec<String> = FIXED_TARGET_SLOTS.iter().map(|s| s.to_string()).collect();
    for os in OsType::ALL {
      if os == OsType::CommonOs {
        continue;
      }
      push_unique(&mut target, os.field_name().to_string());
      for arch_type in os.arch_types() {
        let arch = arch_type.name();
        push_unique(&mut target, format!("{}_{arch}", os.field_name()));
        if os.is_linux() {
          push_unique(&mut target, format!("Linux_{arch}"));
        }
        if os.is_linux() && os.class() == archsplit_platform::OsClass::Host {
          push_unique(&mut target, format!("Host_linux_{arch}"));
        }
        if os.is_bionic() {
          push_unique(&mut target, format!("Bionic_{arch}"));
        }
        if os == OsType::Linux {
          push_unique(&mut target, format!("Glibc_{arch}"));
        }
        if os == OsType::LinuxMusl {
          push_unique(&mut target, format!("Musl_{arch}"));
        }
      }
    }

    Self { arch, target }
  }

  pub fn arch_slots(&self) -> &[ArchSlot] {
    &self.arch
  }

  pub fn target_slots(&self) -> &[String] {
    &self.target
  }

  pub fn has_arch_slot(&self, arch_type: ArchType, variant: Option<&str>) -> bool {
    self
      .arch
      .iter()
      .find(|slot| slot.arch_type == arch_type)
      .is_some_and(|slot| variant.is_none_or(|v| slot.variants.iter().any(|n| n == v)))
  }

  pub fn has_target_slot(&self, field: &str) -> bool {
    self.target.iter().any(|t| t == field)
  }
}

impl Default for SlotLayout {
  fn default() -> Self {
    Self::new()
  }
}

/// Override schema for one shard of a fragment type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchPropTypeDesc {
  shard: FragmentType,
  layout: Arc<SlotLayout>,
}

impl ArchPropTypeDesc {
  /// The arch-variant fields carried by this shard.
  pub fn shard(&self) -> &FragmentType {
    &self.shard
  }

  pub fn layout(&self) -> &SlotLayout {
    &self.layout
  }

  pub fn contains_field(&self, name: &str) -> bool {
    self.shard.lookup(name).is_some()
  }

  /// Every slot of the schema as a dotted path of field names, in layout
  /// order. Two schemas with the same field set render identically.
  pub fn field_paths(&self) -> Vec<String> {
    let mut paths = Vec::new();
    for slot in self.layout.arch_slots() {
      let base = format!("Arch.{}", slot.arch_type.field_name());
      for variant in &slot.variants {
        paths.push(format!("{base}.{variant}"));
      }
      paths.push(base);
    }
    for multilib in [Multilib::Lib32, Multilib::Lib64] {
      paths.push(format!("Multilib.{}", multilib.field_name()));
    }
    for target in self.layout.target_slots() {
      paths.push(format!("Target.{target}"));
    }
    paths
      .into_iter()
      .flat_map(|slot| {
        self
          .shard
          .fields()
          .iter()
          .map(move |f| format!("{slot}.{}", f.name))
          .collect::<Vec<_>>()
      })
      .collect()
  }
}

/// Split the arch-variant fields of `ty` into shards.
///
/// Fields are packed greedily in declaration order; a field whose signature
/// alone exceeds the budget gets a shard of its own.
fn shard_fields(ty: &FragmentType) -> Vec<FragmentType> {
  let filtered = ty.arch_variant_fields();
  let mut shards = Vec::new();
  let mut current: Vec<FieldDecl> = Vec::new();
  let mut used = 0;

  for field in filtered.fields() {
    let cost = field.signature().len();
    if !current.is_empty() && used + cost > MAX_SHARD_UNITS {
      shards.push(filtered.with_fields(std::mem::take(&mut current)));
      used = 0;
    }
    used += cost;
    current.push(field.clone());
  }
  if !current.is_empty() {
    shards.push(filtered.with_fields(current));
  }
  shards
}

/// Build the override schema for `ty`.
///
/// Returns one descriptor per shard; a type without arch-variant fields has
/// no shards.
pub fn build_schema(ty: &FragmentType, layout: &Arc<SlotLayout>) -> Vec<ArchPropTypeDesc> {
  shard_fields(ty)
    .into_iter()
    .map(|shard| ArchPropTypeDesc {
      shard,
      layout: Arc::clone(layout),
    })
    .collect()
}

/// Memoized schemas keyed by the full fragment type declaration.
///
/// One cache lives for one build invocation and is shared by reference by all
/// module processing; entries are computed once and read-only afterwards.
#[derive(Debug)]
pub struct SchemaCache {
  layout: Arc<SlotLayout>,
  entries: Mutex<HashMap<FragmentType, Arc<[ArchPropTypeDesc]>>>,
}

impl SchemaCache {
  pub fn new() -> Self {
    Self {
      layout: Arc::new(SlotLayout::new()),
      entries: Mutex::new(HashMap::new()),
    }
  }

  pub fn layout(&self) -> &SlotLayout {
    &self.layout
  }

  /// Schema for `ty`, computing it on first use.
  pub fn get(&self, ty: &FragmentType) -> Arc<[ArchPropTypeDesc]> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(schema) = entries.get(ty) {
      return Arc::clone(schema);
    }

    let schema: Arc<[ArchPropTypeDesc]> = build_schema(ty, &self.layout).into();
    debug!(fragment = %ty.name(), shards = schema.len(), "built override schema");
    entries.insert(ty.clone(), Arc::clone(&schema));
    schema
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Default for SchemaCache {
  fn default() -> Self {
    Self::new()
  }
}
