// Collection coercion for hypod
//
// Converts raw sequences and mappings to declared `list[T]` / `dict[K, V]`
// types. Element coercion is delegated back to the caller so nested records,
// unions and collections go through the full construction engine.

use crate::internal::error::{Error, FieldPath, Result};
use crate::schema::types::DeclaredType;
use crate::value::source;
use crate::value::types::{RawValue, Value};

/// Coerces `raw` to a sequence or mapping type.
///
/// `coerce_elem` converts one element against its declared type; failures are
/// located by element index (sequences) or key (mappings).
pub fn coerce_collection<F>(raw: &RawValue, declared: &DeclaredType, mut coerce_elem: F) -> Result<Value>
where
    F: FnMut(&RawValue, &DeclaredType) -> Result<Value>,
{
    let parsed;
    let raw = match stringified_collection(raw)? {
        Some(value) => {
            parsed = value;
            &parsed
        }
        None => raw,
    };

    match (declared, raw) {
        (DeclaredType::Seq(elem), RawValue::Seq(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                out.push(coerce_elem(item, elem).map_err(|e| e.within(index.to_string()))?);
            }
            Ok(Value::Seq(out))
        }
        (DeclaredType::Map(key_type, value_type), RawValue::Map(entries)) => {
            if !key_type.is_primitive() {
                return Err(Error::Shape {
                    expected: "a primitive mapping key type".to_string(),
                    found: key_type.to_string(),
                    path: FieldPath::root(),
                });
            }
            let mut out = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let raw_key = RawValue::Str(key.clone());
                let typed_key = coerce_elem(&raw_key, key_type).map_err(|e| e.within(key.clone()))?;
                let typed_value = coerce_elem(value, value_type).map_err(|e| e.within(key.clone()))?;
                out.push((typed_key, typed_value));
            }
            Ok(Value::Map(out))
        }
        (DeclaredType::Seq(_), other) | (DeclaredType::Map(_, _), other) => Err(Error::Shape {
            expected: declared.to_string(),
            found: other.kind_name().to_string(),
            path: FieldPath::root(),
        }),
        (other, _) => Err(Error::Shape {
            expected: "a collection type".to_string(),
            found: other.to_string(),
            path: FieldPath::root(),
        }),
    }
}

/// Parses a string written in flow form (`[1, 2]`, `{a: 1}`) as a collection.
///
/// Command-line values arrive as strings, so this is the only way to assign a
/// whole sequence or mapping from a token. Other strings are left alone.
pub fn stringified_collection(raw: &RawValue) -> Result<Option<RawValue>> {
    let Some(text) = raw.as_str() else {
        return Ok(None);
    };
    let trimmed = text.trim();
    let flow = (trimmed.starts_with('[') && trimmed.ends_with(']'))
        || (trimmed.starts_with('{') && trimmed.ends_with('}'));
    if !flow {
        return Ok(None);
    }
    source::from_yaml_str(trimmed).map(Some).map_err(|e| Error::Coercion {
        value: raw.describe(),
        expected: "a sequence or mapping literal".to_string(),
        reason: e.to_string(),
        path: FieldPath::root(),
    })
}
