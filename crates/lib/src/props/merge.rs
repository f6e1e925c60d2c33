//! Generic merge of one fragment into another, driven by the field table.

use crate::error::PropertyError;

use super::fragment::{FieldKind, Fragment, FragmentType, MergeTag, Value};

fn join(prefix: &str, name: &str) -> String {
  if prefix.is_empty() {
    name.to_string()
  } else {
    format!("{prefix}.{name}")
  }
}

/// Merge `src` into `dst`.
///
/// Lists are concatenated according to the field's merge tag, nested structs
/// merge recursively and scalars are overwritten (last writer wins). `prefix`
/// is the user-facing path of `src`, used to attribute errors.
///
/// # Errors
///
/// Returns an error if `src` sets a field `ty` does not declare or a value of
/// the wrong kind. `dst` may be partially updated when this happens.
pub fn merge_fragment(ty: &FragmentType, dst: &mut Fragment, src: &Fragment, prefix: &str) -> Result<(), PropertyError> {
  for (name, value) in src.iter() {
    let property = join(prefix, name);
    let decl = ty
      .lookup(name)
      .ok_or_else(|| PropertyError::UnknownProperty(property.clone()))?;

    if !value.matches(&decl.kind) {
      return Err(PropertyError::TypeMismatch {
        property,
        expected: decl.kind.describe(),
        found: value.describe(),
      });
    }

    match (dst.get_mut(name), value) {
      (Some(Value::List(existing)), Value::List(incoming)) => match decl.merge {
        MergeTag::Append => existing.extend(incoming.iter().cloned()),
        MergeTag::Prepend => {
          let mut merged = incoming.clone();
          merged.append(existing);
          *existing = merged;
        }
        MergeTag::Replace => *existing = incoming.clone(),
      },
      (Some(Value::Struct(existing)), Value::Struct(incoming)) => {
        let FieldKind::Struct(nested) = &decl.kind else {
          unreachable!("struct value matched a non-struct field");
        };
        merge_fragment(nested, existing, incoming, &property)?;
      }
      (Some(existing), _) if !existing.matches(&decl.kind) => {
        return Err(PropertyError::TypeMismatch {
          property,
          expected: decl.kind.describe(),
          found: existing.describe(),
        });
      }
      (Some(existing), incoming) => *existing = incoming.clone(),
      (None, Value::Struct(incoming)) => {
        // Validate nested fields by merging into an empty struct.
        let FieldKind::Struct(nested) = &decl.kind else {
          unreachable!("struct value matched a non-struct field");
        };
        let mut fresh = Fragment::new();
        merge_fragment(nested, &mut fresh, incoming, &property)?;
        dst.set(name.clone(), fresh);
      }
      (None, incoming) => dst.set(name.clone(), incoming.clone()),
    }
  }
  Ok(())
}

/// Check that every field set in `fragment` is declared by `ty` with a
/// matching kind.
pub fn validate_fragment(ty: &FragmentType, fragment: &Fragment, prefix: &str) -> Result<(), PropertyError> {
  merge_fragment(ty, &mut Fragment::new(), fragment, prefix)
}

/// Check that every field set in `fragment` is flagged `arch_variant`.
///
/// `prefix` is the override path, e.g. `arch.arm`.
pub fn check_arch_variant(ty: &FragmentType, fragment: &Fragment, prefix: &str) -> Result<(), PropertyError> {
  for (name, value) in fragment.iter() {
    let property = join(prefix, name);
    let decl = ty
      .lookup(name)
      .ok_or_else(|| PropertyError::UnknownProperty(property.clone()))?;
    if !decl.arch_variant {
      return Err(PropertyError::NotArchVariant(property));
    }
    if let (FieldKind::Struct(nested), Value::Struct(inner)) = (&decl.kind, value) {
      check_arch_variant(nested, inner, &property)?;
    }
  }
  Ok(())
}
