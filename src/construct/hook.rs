// Post-construction hooks for hypod
//
// A hook sees the fully resolved fields of a record before it is frozen. It
// may recompute fields from other fields; every write is coerced against the
// field's declared type, so a hook cannot change what a field holds.

use std::sync::Arc;

use crate::construct::engine::Engine;
use crate::schema::types::Schema;
use crate::value::record::Record;
use crate::value::types::{RawMap, RawValue, Value};

/// Signature of a post-construction hook. An `Err` message becomes a
/// `PostConstruction` error for the owning type.
pub type PostConstructHook = fn(&mut Draft<'_>) -> Result<(), String>;

/// Mutable view of a record under construction, handed to its hook.
pub struct Draft<'a> {
    engine: Engine<'a>,
    schema: &'a Schema,
    fields: Vec<(String, Value)>,
}

impl<'a> Draft<'a> {
    pub(crate) fn new(engine: Engine<'a>, schema: &'a Schema, fields: Vec<(String, Value)>) -> Self {
        Self { engine, schema, fields }
    }

    pub(crate) fn finish(self) -> Record {
        Record::new(self.schema.name.clone(), self.fields)
    }

    /// Name of the concrete type being built.
    pub fn type_name(&self) -> &str {
        &self.schema.name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn require(&self, name: &str) -> Result<&Value, String> {
        self.get(name)
            .ok_or_else(|| format!("'{}' has no field '{}'", self.schema.name, name))
    }

    pub fn int(&self, name: &str) -> Result<i64, String> {
        let value = self.require(name)?;
        value
            .as_int()
            .ok_or_else(|| format!("field '{}' holds {}, not int", name, value.kind_name()))
    }

    pub fn float(&self, name: &str) -> Result<f64, String> {
        let value = self.require(name)?;
        value
            .as_float()
            .ok_or_else(|| format!("field '{}' holds {}, not float", name, value.kind_name()))
    }

    pub fn bool(&self, name: &str) -> Result<bool, String> {
        let value = self.require(name)?;
        value
            .as_bool()
            .ok_or_else(|| format!("field '{}' holds {}, not bool", name, value.kind_name()))
    }

    pub fn str(&self, name: &str) -> Result<&str, String> {
        let value = self.require(name)?;
        value
            .as_str()
            .ok_or_else(|| format!("field '{}' holds {}, not str", name, value.kind_name()))
    }

    pub fn record(&self, name: &str) -> Result<&Arc<Record>, String> {
        let value = self.require(name)?;
        value
            .as_record()
            .ok_or_else(|| format!("field '{}' holds {}, not a record", name, value.kind_name()))
    }

    /// Replaces a field value. The new value is coerced against the field's
    /// declared type; a value that does not conform is rejected.
    pub fn set(&mut self, name: &str, value: impl Into<RawValue>) -> Result<(), String> {
        let spec = self
            .schema
            .field(name)
            .ok_or_else(|| format!("'{}' has no field '{}'", self.schema.name, name))?;
        let typed = self
            .engine
            .construct(&value.into(), &spec.declared_type)
            .map_err(|e| e.within(name).to_string())?;
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| n == name) {
            slot.1 = typed;
        }
        Ok(())
    }

    /// Re-derives the record held by field `name` with `overrides` applied.
    /// The nested record's own hook runs again.
    pub fn replace_record<K, I>(&mut self, name: &str, overrides: I) -> Result<(), String>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RawValue)>,
    {
        let base = self.record(name)?.clone();
        let overrides: RawMap = overrides.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let rebuilt = self
            .engine
            .rebuild(&base, &overrides)
            .map_err(|e| e.within(name).to_string())?;
        self.set(name, rebuilt)
    }
}
