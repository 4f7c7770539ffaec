// Structured construction engine for hypod
//
// Single-pass recursive descent: primitives go to scalar coercion, collections
// to collection coercion (recursing per element), structured types and unions
// through tag dispatch and then field-by-field record building. Construction
// only reads the registry.

use std::sync::Arc;

use tracing::trace;

use crate::coerce::collection::coerce_collection;
use crate::coerce::scalar::coerce_scalar;
use crate::construct::dispatch::Resolved;
use crate::construct::hook::Draft;
use crate::internal::error::{Error, FieldPath, Result};
use crate::schema::registry::SchemaRegistry;
use crate::schema::types::{DeclaredType, FieldSpec, TAG_KEY};
use crate::value::record::Record;
use crate::value::types::{RawMap, RawValue, Value};

/// Builds typed values from raw values against a registry.
#[derive(Debug, Clone, Copy)]
pub struct Engine<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> Engine<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    /// Coerces or constructs `raw` against `declared`.
    pub fn construct(&self, raw: &RawValue, declared: &DeclaredType) -> Result<Value> {
        match declared {
            DeclaredType::Struct(_) | DeclaredType::Union(_) => match self.resolve(raw, declared)? {
                Resolved::Instance(record) => Ok(Value::Record(record)),
                Resolved::Build { type_name, fields } => {
                    self.build_record(&type_name, &fields).map(Value::Record)
                }
                Resolved::Member(member) => self.construct(raw, &member),
            },
            DeclaredType::Seq(_) | DeclaredType::Map(_, _) => {
                coerce_collection(raw, declared, |elem, ty| self.construct(elem, ty))
            }
            primitive => coerce_scalar(raw, primitive),
        }
    }

    /// Builds one record of the concrete type `type_name` from a field mapping.
    ///
    /// Unknown keys are rejected before any field is built, absent fields take
    /// their defaults, and the type's post-construction hook runs last.
    pub fn build_record(&self, type_name: &str, fields: &RawMap) -> Result<Arc<Record>> {
        let schema = self.registry.lookup_schema(type_name)?;

        for key in fields.keys() {
            if schema.field(key).is_none() {
                return Err(Error::UnknownField {
                    field: key.clone(),
                    owner: schema.name.clone(),
                    suggestion: suggest(key, schema.field_names()),
                    path: FieldPath::parse(key),
                });
            }
        }

        let mut values = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let value = match fields.get(&field.name) {
                Some(raw) => self.build_field(raw, field),
                None => match &field.default {
                    Some(default) => self.construct(default, &field.declared_type),
                    None => Err(Error::MissingField {
                        field: field.name.clone(),
                        owner: schema.name.clone(),
                        path: FieldPath::root(),
                    }),
                },
            }
            .map_err(|e| e.within(field.name.clone()))?;
            values.push((field.name.clone(), value));
        }

        let record = match schema.hook {
            Some(hook) => {
                let mut draft = Draft::new(*self, &schema, values);
                hook(&mut draft).map_err(|message| Error::PostConstruction {
                    owner: schema.name.clone(),
                    message,
                    path: FieldPath::root(),
                })?;
                draft.finish()
            }
            None => Record::new(schema.name.clone(), values),
        };

        trace!(type_name = %schema.name, "built record");
        Ok(Arc::new(record))
    }

    /// Builds a field value. A tagless mapping given for a field with a
    /// structured default is merged over the default before anything is built,
    /// so the default's hook only ever sees the merged fields.
    fn build_field(&self, raw: &RawValue, field: &FieldSpec) -> Result<Value> {
        if let (RawValue::Map(overrides), Some(default)) = (raw, &field.default) {
            if !overrides.contains_key(TAG_KEY) && references_struct(&field.declared_type) {
                match self.resolve(default, &field.declared_type)? {
                    Resolved::Build { type_name, fields } => {
                        let mut merged = RawValue::Map(fields);
                        merged.deep_merge(raw.clone());
                        if let RawValue::Map(merged) = merged {
                            return self.build_record(&type_name, &merged).map(Value::Record);
                        }
                    }
                    Resolved::Instance(base) => {
                        return self.rebuild(&base, overrides).map(Value::Record);
                    }
                    Resolved::Member(_) => {}
                }
            }
        }
        self.construct(raw, &field.declared_type)
    }

    /// Derives a new record of the same concrete type from `base` with
    /// `overrides` deep-merged over its field values.
    ///
    /// A tagless mapping given for a field that currently holds a record is
    /// applied to that record recursively. The hook runs again.
    pub fn rebuild(&self, base: &Record, overrides: &RawMap) -> Result<Arc<Record>> {
        let mut merged: RawMap = base
            .fields()
            .map(|(name, value)| (name.to_string(), RawValue::from(value.clone())))
            .collect();

        for (key, value) in overrides {
            let nested = match (merged.get(key), value) {
                (Some(RawValue::Instance(inner)), RawValue::Map(map)) if !map.contains_key(TAG_KEY) => {
                    Some(self.rebuild(inner, map).map_err(|e| e.within(key.clone()))?)
                }
                _ => None,
            };
            match nested {
                Some(record) => merged.insert(key.clone(), RawValue::Instance(record)),
                None => merged.insert(key.clone(), value.clone()),
            };
        }

        self.build_record(base.type_name(), &merged)
    }
}

fn references_struct(ty: &DeclaredType) -> bool {
    !ty.direct_struct_refs().is_empty()
}

/// Closest field name to a misspelled key, if any is close enough.
fn suggest<'a>(key: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let limit = (key.chars().count() / 3).max(1);
    candidates
        .map(|c| (strsim::levenshtein(key, c), c))
        .filter(|(distance, _)| *distance <= limit)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, c)| c.to_string())
}
