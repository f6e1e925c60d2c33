//! Configuration fragments and their declared field metadata.
//!
//! A module type declares each of its property structs as a `FragmentType`:
//! an ordered table of fields with a kind, a merge tag and an `arch_variant`
//! flag. Values are carried in `Fragment`s, sparse maps holding only the
//! fields that were actually set.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How list values combine when a fragment is merged into another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeTag {
  /// `dst ++ src`
  #[default]
  Append,
  /// `src ++ dst`
  Prepend,
  /// `src` replaces `dst`
  Replace,
}

/// Declared kind of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
  Bool,
  Int,
  String,
  StringList,
  Struct(FragmentType),
}

impl FieldKind {
  pub fn describe(&self) -> &'static str {
    match self {
      FieldKind::Bool => "bool",
      FieldKind::Int => "int",
      FieldKind::String => "string",
      FieldKind::StringList => "list of strings",
      FieldKind::Struct(_) => "struct",
    }
  }

  fn signature(&self) -> String {
    match self {
      FieldKind::Bool => "*bool".to_string(),
      FieldKind::Int => "*int64".to_string(),
      FieldKind::String => "*string".to_string(),
      FieldKind::StringList => "[]string".to_string(),
      FieldKind::Struct(ty) => ty.signature(),
    }
  }
}

/// One declared field of a fragment type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDecl {
  pub name: String,
  pub kind: FieldKind,
  #[serde(default)]
  pub merge: MergeTag,
  /// The field may be overridden per arch, multilib or target.
  #[serde(default)]
  pub arch_variant: bool,
}

impl FieldDecl {
  pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
    Self {
      name: name.into(),
      kind,
      merge: MergeTag::Append,
      arch_variant: false,
    }
  }

  pub fn bool(name: impl Into<String>) -> Self {
    Self::new(name, FieldKind::Bool)
  }

  pub fn int(name: impl Into<String>) -> Self {
    Self::new(name, FieldKind::Int)
  }

  pub fn string(name: impl Into<String>) -> Self {
    Self::new(name, FieldKind::String)
  }

  pub fn string_list(name: impl Into<String>) -> Self {
    Self::new(name, FieldKind::StringList)
  }

  pub fn nested(name: impl Into<String>, ty: FragmentType) -> Self {
    Self::new(name, FieldKind::Struct(ty))
  }

  pub fn arch_variant(mut self) -> Self {
    self.arch_variant = true;
    self
  }

  pub fn prepend(mut self) -> Self {
    self.merge = MergeTag::Prepend;
    self
  }

  pub fn replace(mut self) -> Self {
    self.merge = MergeTag::Replace;
    self
  }

  /// Rendered `name kind` pair; its length is the field's cost when sharding.
  pub fn signature(&self) -> String {
    format!("{} {}", self.name, self.kind.signature())
  }
}

/// Declared shape of a property struct.
///
/// The name is the type's identity: two declarations with the same name are
/// assumed to describe the same struct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentType {
  name: String,
  fields: Vec<FieldDecl>,
}

impl FragmentType {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      fields: Vec::new(),
    }
  }

  pub fn field(mut self, field: FieldDecl) -> Self {
    self.fields.push(field);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn fields(&self) -> &[FieldDecl] {
    &self.fields
  }

  pub fn lookup(&self, name: &str) -> Option<&FieldDecl> {
    self.fields.iter().find(|f| f.name == name)
  }

  pub fn signature(&self) -> String {
    let fields: Vec<String> = self.fields.iter().map(FieldDecl::signature).collect();
    format!("struct {{ {} }}", fields.join("; "))
  }

  /// Copy of this type restricted to `arch_variant` fields, recursively.
  ///
  /// Nested structs survive only if they are flagged themselves and keep at
  /// least one flagged field.
  pub fn arch_variant_fields(&self) -> FragmentType {
    let fields = self
      .fields
      .iter()
      .filter(|f| f.arch_variant)
      .filter_map(|f| match &f.kind {
        FieldKind::Struct(nested) => {
          let filtered = nested.arch_variant_fields();
          if filtered.fields.is_empty() {
            None
          } else {
            Some(FieldDecl {
              kind: FieldKind::Struct(filtered),
              ..f.clone()
            })
          }
        }
        _ => Some(f.clone()),
      })
      .collect();

    FragmentType {
      name: self.name.clone(),
      fields,
    }
  }

  /// A type with the same name holding only `fields`.
  pub(crate) fn with_fields(&self, fields: Vec<FieldDecl>) -> FragmentType {
    FragmentType {
      name: self.name.clone(),
      fields,
    }
  }
}

/// A property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Bool(bool),
  Int(i64),
  String(String),
  List(Vec<String>),
  Struct(Fragment),
}

impl Value {
  pub fn describe(&self) -> &'static str {
    match self {
      Value::Bool(_) => "bool",
      Value::Int(_) => "int",
      Value::String(_) => "string",
      Value::List(_) => "list of strings",
      Value::Struct(_) => "struct",
    }
  }

  pub(crate) fn matches(&self, kind: &FieldKind) -> bool {
    matches!(
      (self, kind),
      (Value::Bool(_), FieldKind::Bool)
        | (Value::Int(_), FieldKind::Int)
        | (Value::String(_), FieldKind::String)
        | (Value::List(_), FieldKind::StringList)
        | (Value::Struct(_), FieldKind::Struct(_))
    )
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[String]> {
    match self {
      Value::List(l) => Some(l),
      _ => None,
    }
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Value::Bool(value)
  }
}

impl From<i64> for Value {
  fn from(value: i64) -> Self {
    Value::Int(value)
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::String(value.to_string())
  }
}

impl From<Vec<&str>> for Value {
  fn from(value: Vec<&str>) -> Self {
    Value::List(value.into_iter().map(str::to_string).collect())
  }
}

impl From<Fragment> for Value {
  fn from(value: Fragment) -> Self {
    Value::Struct(value)
  }
}

/// Sparse set of property values. Unset fields are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragment(BTreeMap<String, Value>);

impl Fragment {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder form of `set`.
  pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.set(name, value);
    self
  }

  pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
    self.0.insert(name.into(), value.into());
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.0.get(name)
  }

  pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
    self.0.get_mut(name)
  }

  pub fn remove(&mut self, name: &str) -> Option<Value> {
    self.0.remove(name)
  }

  /// `true` if no field is set; such a fragment is the zero value and is
  /// never merged.
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.0.iter()
  }

  /// Convenience accessor for list fields, empty when unset.
  pub fn list(&self, name: &str) -> &[String] {
    self.get(name).and_then(Value::as_list).unwrap_or(&[])
  }
}

impl fmt::Display for Fragment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (name, value)) in self.0.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{name}: {value:?}")?;
    }
    write!(f, "}}")
  }
}
