// Construction module for hypod
//
// This module turns raw values into typed object graphs. It includes:
//
// 1. Tag dispatch for tagged families and unions
// 2. The recursive construction engine
// 3. Post-construction hooks and their draft view
// 4. Reconstruction with overrides and the typed bridge

use std::sync::Arc;

pub use self::dispatch::Resolved;
pub use self::engine::Engine;
pub use self::hook::{Draft, PostConstructHook};

pub mod dispatch;
pub mod engine;
pub mod hook;

use crate::internal::error::{Error, FieldPath, Result};
use crate::schema::registry::SchemaRegistry;
use crate::schema::types::DeclaredType;
use crate::value::record::Record;
use crate::value::types::{RawMap, RawValue, Value};

/// A plain Rust type that can be read out of a constructed record.
pub trait Hypod: Sized {
    /// Registered name of the structured type.
    const TYPE_NAME: &'static str;

    /// Reads the typed fields of a record built for `TYPE_NAME` (or a subtype).
    fn from_record(record: &Record) -> Result<Self>;
}

impl SchemaRegistry {
    /// Coerces or constructs `raw` against any declared type.
    pub fn construct(&self, raw: &RawValue, declared: &DeclaredType) -> Result<Value> {
        Engine::new(self).construct(raw, declared)
    }

    /// Constructs a record assignable to the structured type `type_name`.
    ///
    /// `raw` may be an instance, a field mapping (optionally with a `_tag` key),
    /// or a tag string.
    pub fn construct_record(&self, raw: impl Into<RawValue>, type_name: &str) -> Result<Arc<Record>> {
        let raw = raw.into();
        self.lookup_schema(type_name)?;
        match self.construct(&raw, &DeclaredType::structured(type_name))? {
            Value::Record(record) => Ok(record),
            other => Err(Error::Shape {
                expected: type_name.to_string(),
                found: other.kind_name().to_string(),
                path: FieldPath::root(),
            }),
        }
    }

    /// Constructs a record and reads it into `T`.
    pub fn construct_as<T: Hypod>(&self, raw: impl Into<RawValue>) -> Result<T> {
        let record = self.construct_record(raw, T::TYPE_NAME)?;
        T::from_record(&record)
    }

    /// Derives a new record from `record` with `overrides` deep-merged over
    /// its fields. Validation and the post-construction hook run again.
    pub fn replace(&self, record: &Record, overrides: RawMap) -> Result<Arc<Record>> {
        Engine::new(self).rebuild(record, &overrides)
    }
}

impl Record {
    /// Derives a modified copy; see [`SchemaRegistry::replace`].
    pub fn replace<K, I>(&self, registry: &SchemaRegistry, overrides: I) -> Result<Arc<Record>>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RawValue)>,
    {
        let overrides: RawMap = overrides.into_iter().map(|(k, v)| (k.into(), v)).collect();
        registry.replace(self, overrides)
    }
}
