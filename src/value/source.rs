// Mapping sources for hypod
//
// Any loader that yields a mapping or scalar in the `RawValue` shapes is an
// acceptable source. YAML (text or file) and JSON are provided here.

use std::fs;
use std::path::Path;

use crate::internal::error::{Error, Result};
use crate::value::types::{RawMap, RawValue};

/// Parses YAML text into a raw value. An empty document yields an empty mapping.
pub fn from_yaml_str(text: &str) -> Result<RawValue> {
    if text.trim().is_empty() {
        return Ok(RawValue::empty_map());
    }
    let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
    from_yaml(doc)
}

/// Reads and parses a YAML file.
pub fn load_yaml(path: impl AsRef<Path>) -> Result<RawValue> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::Source {
        origin: path.display().to_string(),
        message: e.to_string(),
    })?;
    from_yaml_str(&text).map_err(|e| match e {
        Error::Source { message, .. } => Error::Source {
            origin: path.display().to_string(),
            message,
        },
        other => other,
    })
}

/// Converts a parsed YAML document.
pub fn from_yaml(value: serde_yaml::Value) -> Result<RawValue> {
    use serde_yaml::Value as Y;

    Ok(match value {
        Y::Null => RawValue::Null,
        Y::Bool(b) => RawValue::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                RawValue::Int(i)
            } else if let Some(x) = n.as_f64() {
                RawValue::Float(x)
            } else {
                return Err(Error::Source {
                    origin: "yaml".to_string(),
                    message: format!("number {} is out of range", n),
                });
            }
        }
        Y::String(s) => RawValue::Str(s),
        Y::Sequence(items) => RawValue::Seq(
            items
                .into_iter()
                .map(from_yaml)
                .collect::<Result<Vec<_>>>()?,
        ),
        Y::Mapping(mapping) => {
            let mut map = RawMap::with_capacity(mapping.len());
            for (key, value) in mapping {
                map.insert(yaml_key(key)?, from_yaml(value)?);
            }
            RawValue::Map(map)
        }
        Y::Tagged(tagged) => from_yaml(tagged.value)?,
    })
}

fn yaml_key(key: serde_yaml::Value) -> Result<String> {
    use serde_yaml::Value as Y;

    match key {
        Y::String(s) => Ok(s),
        Y::Bool(b) => Ok(b.to_string()),
        Y::Number(n) => Ok(n.to_string()),
        other => Err(Error::Source {
            origin: "yaml".to_string(),
            message: format!("mapping keys must be scalars, found {:?}", other),
        }),
    }
}

/// Converts a parsed JSON document.
pub fn from_json(value: serde_json::Value) -> Result<RawValue> {
    use serde_json::Value as J;

    Ok(match value {
        J::Null => RawValue::Null,
        J::Bool(b) => RawValue::Bool(b),
        J::Number(n) => {
            if let Some(i) = n.as_i64() {
                RawValue::Int(i)
            } else if let Some(x) = n.as_f64() {
                RawValue::Float(x)
            } else {
                return Err(Error::Source {
                    origin: "json".to_string(),
                    message: format!("number {} is out of range", n),
                });
            }
        }
        J::String(s) => RawValue::Str(s),
        J::Array(items) => RawValue::Seq(
            items
                .into_iter()
                .map(from_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        J::Object(object) => {
            let mut map = RawMap::with_capacity(object.len());
            for (key, value) in object {
                map.insert(key, from_json(value)?);
            }
            RawValue::Map(map)
        }
    })
}

/// Parses JSON text into a raw value.
pub fn from_json_str(text: &str) -> Result<RawValue> {
    let doc: serde_json::Value = serde_json::from_str(text)?;
    from_json(doc)
}
