// Tag dispatch for hypod
//
// Decides which concrete type a raw value builds when the declared type is a
// structured type (possibly the base of a tagged family) or a union. True
// ambiguity is always an error; declaration order never picks a winner.

use std::sync::Arc;

use tracing::debug;

use crate::coerce::collection::stringified_collection;
use crate::coerce::scalar::{coerce_scalar, is_native};
use crate::construct::engine::Engine;
use crate::internal::error::{Error, FieldPath, Result};
use crate::schema::types::{DeclaredType, TAG_KEY};
use crate::value::record::Record;
use crate::value::types::{RawMap, RawValue};

/// Outcome of dispatching a raw value against a structured or union type.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// The raw value is already an assignable instance; it is used unchanged.
    Instance(Arc<Record>),
    /// Build `type_name` from `fields` (the tag key already stripped).
    Build {
        type_name: String,
        fields: RawMap,
    },
    /// Coerce the raw value against this non-structured union member.
    Member(DeclaredType),
}

impl Resolved {
    /// Name of the concrete type, when one was selected.
    pub fn concrete_type(&self) -> Option<&str> {
        match self {
            Resolved::Instance(r) => Some(r.type_name()),
            Resolved::Build { type_name, .. } => Some(type_name),
            Resolved::Member(_) => None,
        }
    }
}

/// One union member that accepts the raw value.
#[derive(Debug, Clone)]
enum Candidate {
    Build { type_name: String },
    Member { ty: DeclaredType, native: bool },
}

impl Candidate {
    fn label(&self) -> String {
        match self {
            Candidate::Build { type_name } => type_name.clone(),
            Candidate::Member { ty, .. } => ty.to_string(),
        }
    }
}

fn shape(expected: impl Into<String>, found: &RawValue) -> Error {
    Error::Shape {
        expected: expected.into(),
        found: found.describe(),
        path: FieldPath::root(),
    }
}

/// Splits the tag key off a mapping. The tag must be a string.
fn split_tag(map: &RawMap) -> Result<(Option<String>, RawMap)> {
    match map.get(TAG_KEY) {
        None => Ok((None, map.clone())),
        Some(RawValue::Str(tag)) => {
            let mut rest = map.clone();
            rest.shift_remove(TAG_KEY);
            Ok((Some(tag.clone()), rest))
        }
        Some(other) => Err(shape("a string tag", other).within(TAG_KEY)),
    }
}

impl<'r> Engine<'r> {
    /// Selects the concrete type for `raw` against a structured or union type.
    pub fn resolve(&self, raw: &RawValue, declared: &DeclaredType) -> Result<Resolved> {
        let resolved = match declared {
            DeclaredType::Struct(name) => self.resolve_struct(raw, name)?,
            DeclaredType::Union(members) => self.resolve_union(raw, declared, members)?,
            other => Resolved::Member(other.clone()),
        };
        debug!(declared = %declared, raw = %raw.describe(), concrete = ?resolved.concrete_type(), "dispatched");
        Ok(resolved)
    }

    fn resolve_struct(&self, raw: &RawValue, name: &str) -> Result<Resolved> {
        let registry = self.registry();
        // Fail early for unregistered (forward or misspelled) references
        registry.lookup_schema(name)?;

        match raw {
            RawValue::Instance(record) => {
                if registry.is_subtype(record.type_name(), name) {
                    Ok(Resolved::Instance(record.clone()))
                } else {
                    Err(shape(format!("an instance of '{}'", name), raw))
                }
            }
            RawValue::Map(map) => {
                let (tag, fields) = split_tag(map)?;
                match tag {
                    Some(tag) => Ok(Resolved::Build {
                        type_name: registry.resolve_tag_under(name, &tag)?,
                        fields,
                    }),
                    None => Ok(Resolved::Build {
                        type_name: name.to_string(),
                        fields,
                    }),
                }
            }
            RawValue::Str(tag) => {
                if let Some(parsed @ RawValue::Map(_)) = stringified_collection(raw)? {
                    return self.resolve_struct(&parsed, name);
                }
                if registry.tags_under(name).is_empty() {
                    return Err(shape(
                        format!("a mapping or instance of '{}' (it has no tagged subtypes)", name),
                        raw,
                    ));
                }
                Ok(Resolved::Build {
                    type_name: registry.resolve_tag_under(name, tag)?,
                    fields: RawMap::new(),
                })
            }
            other => Err(shape(format!("a mapping, tag or instance of '{}'", name), other)),
        }
    }

    fn resolve_union(&self, raw: &RawValue, declared: &DeclaredType, members: &[DeclaredType]) -> Result<Resolved> {
        let registry = self.registry();
        let struct_members: Vec<&str> = members
            .iter()
            .filter_map(|m| match m {
                DeclaredType::Struct(name) => Some(name.as_str()),
                _ => None,
            })
            .collect();

        match raw {
            RawValue::Instance(record) => {
                if struct_members
                    .iter()
                    .any(|m| registry.is_subtype(record.type_name(), m))
                {
                    Ok(Resolved::Instance(record.clone()))
                } else {
                    Err(no_match(declared, raw))
                }
            }
            RawValue::Map(map) => {
                let (tag, fields) = split_tag(map)?;
                if let Some(tag) = tag {
                    let type_name = self.resolve_union_tag(declared, &struct_members, &tag)?;
                    return Ok(Resolved::Build { type_name, fields });
                }

                let mut candidates = Vec::new();
                for member in members {
                    match member {
                        DeclaredType::Struct(name) => {
                            let schema = registry.lookup_schema(name)?;
                            if schema.required_fields().all(|f| fields.contains_key(f)) {
                                candidates.push(Candidate::Build { type_name: name.clone() });
                            }
                        }
                        DeclaredType::Map(_, _) => {
                            if self.construct(raw, member).is_ok() {
                                candidates.push(Candidate::Member {
                                    ty: member.clone(),
                                    native: true,
                                });
                            }
                        }
                        _ => {}
                    }
                }
                let chosen = pick(declared, raw, candidates)?;
                Ok(match chosen {
                    Candidate::Build { type_name } => Resolved::Build { type_name, fields },
                    Candidate::Member { ty, .. } => Resolved::Member(ty),
                })
            }
            RawValue::Seq(_) => {
                let candidates = members
                    .iter()
                    .filter(|m| matches!(m, DeclaredType::Seq(_)) && self.construct(raw, m).is_ok())
                    .map(|m| Candidate::Member {
                        ty: m.clone(),
                        native: true,
                    })
                    .collect();
                match pick(declared, raw, candidates)? {
                    Candidate::Member { ty, .. } => Ok(Resolved::Member(ty)),
                    Candidate::Build { .. } => Err(no_match(declared, raw)),
                }
            }
            _ => self.resolve_union_scalar(raw, declared, members),
        }
    }

    fn resolve_union_scalar(&self, raw: &RawValue, declared: &DeclaredType, members: &[DeclaredType]) -> Result<Resolved> {
        let registry = self.registry();
        let mut candidates: Vec<Candidate> = Vec::new();

        for member in members {
            match member {
                ty if ty.is_primitive() => {
                    if coerce_scalar(raw, ty).is_ok() {
                        candidates.push(Candidate::Member {
                            ty: ty.clone(),
                            native: is_native(raw, ty),
                        });
                    }
                }
                DeclaredType::Struct(name) => {
                    if let RawValue::Str(tag) = raw {
                        if let Ok(concrete) = registry.resolve_tag_under(name, tag) {
                            let duplicate = candidates.iter().any(
                                |c| matches!(c, Candidate::Build { type_name } if *type_name == concrete),
                            );
                            if !duplicate {
                                candidates.push(Candidate::Build { type_name: concrete });
                            }
                        }
                    }
                }
                DeclaredType::Seq(_) | DeclaredType::Map(_, _) => {
                    if matches!(raw, RawValue::Str(_)) && self.construct(raw, member).is_ok() {
                        candidates.push(Candidate::Member {
                            ty: member.clone(),
                            native: false,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(match pick(declared, raw, candidates)? {
            Candidate::Build { type_name } => Resolved::Build {
                type_name,
                fields: RawMap::new(),
            },
            Candidate::Member { ty, .. } => Resolved::Member(ty),
        })
    }

    /// A tag inside a union must name a type in exactly one member's subtree.
    fn resolve_union_tag(&self, declared: &DeclaredType, struct_members: &[&str], tag: &str) -> Result<String> {
        let registry = self.registry();
        let mut found: Vec<String> = Vec::new();
        for member in struct_members {
            if let Ok(concrete) = registry.resolve_tag_under(member, tag) {
                if !found.contains(&concrete) {
                    found.push(concrete);
                }
            }
        }
        match found.len() {
            0 => Err(Error::UnknownTag {
                tag: tag.to_string(),
                family: declared.to_string(),
                path: FieldPath::root(),
            }),
            1 => Ok(found.remove(0)),
            _ => Err(Error::AmbiguousUnion {
                union: declared.to_string(),
                found: format!("tag {:?}", tag),
                candidates: found,
                path: FieldPath::root(),
            }),
        }
    }
}

fn no_match(declared: &DeclaredType, raw: &RawValue) -> Error {
    Error::NoMatch {
        union: declared.to_string(),
        found: raw.describe(),
        path: FieldPath::root(),
    }
}

/// Picks the single eligible candidate.
///
/// Several candidates are ambiguous, except when they are all primitives and
/// exactly one of them already has the raw value's runtime type.
fn pick(declared: &DeclaredType, raw: &RawValue, mut candidates: Vec<Candidate>) -> Result<Candidate> {
    match candidates.len() {
        0 => Err(no_match(declared, raw)),
        1 => Ok(candidates.remove(0)),
        _ => {
            let all_primitive = candidates
                .iter()
                .all(|c| matches!(c, Candidate::Member { ty, .. } if ty.is_primitive()));
            let native: Vec<&Candidate> = candidates
                .iter()
                .filter(|c| matches!(c, Candidate::Member { native: true, .. }))
                .collect();
            if all_primitive && native.len() == 1 {
                return Ok(native[0].clone());
            }
            Err(Error::AmbiguousUnion {
                union: declared.to_string(),
                found: raw.describe(),
                candidates: candidates.iter().map(Candidate::label).collect(),
                path: FieldPath::root(),
            })
        }
    }
}
