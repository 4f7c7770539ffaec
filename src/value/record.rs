// Immutable constructed records
//
// A `Record` is the built form of a structured type. It can only be created by
// the construction engine, so every field value has been coerced against its
// declared type. There are no setters: deriving a changed copy goes through
// `Record::replace`, which re-enters the engine.

use std::fmt;
use std::sync::Arc;

use crate::internal::error::{Error, FieldPath, Result};
use crate::value::types::Value;

/// A constructed instance of a structured type.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Fields must already be in schema order and conform to their declared types.
    pub(crate) fn new(type_name: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    /// Name of the concrete structured type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Field names and values in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Looks up a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up a field and fails with a located error when it is absent.
    pub fn require(&self, name: &str) -> Result<&Value> {
        self.get(name).ok_or_else(|| Error::MissingField {
            field: name.to_string(),
            owner: self.type_name.clone(),
            path: FieldPath::root(),
        })
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        let value = self.require(name)?;
        value.as_int().ok_or_else(|| self.shape_error(name, "int", value))
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        let value = self.require(name)?;
        value.as_float().ok_or_else(|| self.shape_error(name, "float", value))
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        let value = self.require(name)?;
        value.as_bool().ok_or_else(|| self.shape_error(name, "bool", value))
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        let value = self.require(name)?;
        value.as_str().ok_or_else(|| self.shape_error(name, "str", value))
    }

    pub fn record(&self, name: &str) -> Result<&Arc<Record>> {
        let value = self.require(name)?;
        value.as_record().ok_or_else(|| self.shape_error(name, "record", value))
    }

    /// Like `int`, but `null` reads as `None`.
    pub fn opt_int(&self, name: &str) -> Result<Option<i64>> {
        match self.require(name)? {
            Value::Null => Ok(None),
            value => value
                .as_int()
                .map(Some)
                .ok_or_else(|| self.shape_error(name, "int or null", value)),
        }
    }

    fn shape_error(&self, name: &str, expected: &str, found: &Value) -> Error {
        Error::Shape {
            expected: expected.to_string(),
            found: found.kind_name().to_string(),
            path: FieldPath::parse(name),
        }
    }

    pub(crate) fn write(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pretty = f.alternate();
        write!(f, "{}(", self.type_name)?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if pretty {
                write!(f, "\n{:width$}{}=", "", name, width = (indent + 1) * 4)?;
            } else {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}=", name)?;
            }
            value.write(f, indent + 1)?;
            if pretty {
                write!(f, ",")?;
            }
        }
        if pretty && !self.fields.is_empty() {
            write!(f, "\n{:width$}", "", width = indent * 4)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, 0)
    }
}
