// Schema registry for hypod
//
// Holds one schema per structured type and one tag table per polymorphic
// family. Writes happen while types are declared; afterwards the registry is
// only read, so lookups hand out `Arc<Schema>` clones and release the lock
// immediately.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::coerce::collection::coerce_collection;
use crate::coerce::scalar::coerce_scalar;
use crate::internal::error::{Error, FieldPath, Result};
use crate::schema::types::{DeclaredType, FieldSpec, Schema, TypeDecl, TAG_KEY};
use crate::value::types::{RawValue, Value};

#[derive(Debug, Default)]
struct Inner {
    /// Type name -> schema
    schemas: HashMap<String, Arc<Schema>>,
    /// Registration order, for stable listings
    order: Vec<String>,
    /// Family root -> (tag -> concrete type)
    tags: HashMap<String, IndexMap<String, String>>,
}

impl Inner {
    fn family_root(&self, name: &str) -> Option<String> {
        let mut current = self.schemas.get(name)?;
        while let Some(parent) = &current.parent {
            current = self.schemas.get(parent)?;
        }
        Some(current.name.clone())
    }

    fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        let mut current = Some(sub.to_string());
        while let Some(name) = current {
            if name == sup {
                return true;
            }
            current = self.schemas.get(&name).and_then(|s| s.parent.clone());
        }
        false
    }

    /// `name` and every registered type extending it.
    fn subtypes_of(&self, name: &str) -> Vec<String> {
        self.schemas
            .keys()
            .filter(|candidate| self.is_subtype(candidate, name))
            .cloned()
            .collect()
    }

    /// `name` followed by its ancestors, nearest first.
    fn lineage(&self, name: &str, parent: Option<&String>) -> Vec<String> {
        let mut lineage = vec![name.to_string()];
        let mut current = parent.cloned();
        while let Some(ancestor) = current {
            current = self.schemas.get(&ancestor).and_then(|s| s.parent.clone());
            lineage.push(ancestor);
        }
        lineage
    }
}

/// A registry of structured-type schemas
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    inner: RwLock<Inner>,
}

impl SchemaRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from declarations given in any order.
    ///
    /// Parents and directly referenced field types are registered before the
    /// types that depend on them.
    pub fn from_declarations<I>(decls: I) -> Result<Self>
    where
        I: IntoIterator<Item = TypeDecl>,
    {
        let registry = Self::new();
        let mut pending: Vec<TypeDecl> = decls.into_iter().collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut stuck = Vec::new();
            for decl in pending {
                if registry.dependencies_met(&decl) {
                    registry.register(decl)?;
                } else {
                    stuck.push(decl);
                }
            }
            pending = stuck;

            if pending.len() == before {
                let names: Vec<&str> = pending.iter().map(|d| d.name.as_str()).collect();
                let first = &pending[0];
                let missing_outside = dependencies(first)
                    .into_iter()
                    .filter(|dep| !registry.contains(dep))
                    .any(|dep| dep == first.name || !names.contains(&dep));
                if missing_outside {
                    // `register` reports the precise problem
                    registry.register(first.clone())?;
                }
                return Err(Error::Schema(format!(
                    "cyclic type references among: {}",
                    names.join(", ")
                )));
            }
        }

        Ok(registry)
    }

    fn dependencies_met(&self, decl: &TypeDecl) -> bool {
        let inner = self.inner.read();
        dependencies(decl)
            .into_iter()
            .all(|dep| dep != decl.name && inner.schemas.contains_key(dep))
    }

    /// Registers a structured type.
    ///
    /// Fails with `Error::Schema` when the name is taken, the parent is unknown,
    /// an inherited field is redeclared with a different type, a tag collides
    /// within the family, or a field references an unregistered type (or the
    /// type itself) outside a collection.
    pub fn register(&self, decl: TypeDecl) -> Result<Arc<Schema>> {
        let mut inner = self.inner.write();

        if decl.name.is_empty() {
            return Err(Error::Schema("type name must not be empty".to_string()));
        }
        if inner.schemas.contains_key(&decl.name) {
            return Err(Error::Schema(format!("type '{}' is already registered", decl.name)));
        }

        let mut seen = Vec::new();
        for field in &decl.fields {
            if field.name.is_empty() || field.name.contains('.') || field.name.contains('=') {
                return Err(Error::Schema(format!(
                    "type '{}' declares an invalid field name '{}'",
                    decl.name, field.name
                )));
            }
            if field.name == TAG_KEY {
                return Err(Error::Schema(format!(
                    "type '{}' declares the reserved field name '{}'",
                    decl.name, TAG_KEY
                )));
            }
            if seen.contains(&field.name.as_str()) {
                return Err(Error::Schema(format!(
                    "type '{}' declares field '{}' twice",
                    decl.name, field.name
                )));
            }
            seen.push(field.name.as_str());
        }

        // Start from the inherited fields
        let mut fields = match &decl.parent {
            Some(parent) => match inner.schemas.get(parent) {
                Some(parent_schema) => parent_schema.fields.clone(),
                None => {
                    return Err(Error::Schema(format!(
                        "type '{}' extends unregistered type '{}'",
                        decl.name, parent
                    )))
                }
            },
            None => Vec::new(),
        };

        for field in &decl.fields {
            check_declared_type(&inner, &decl.name, &field.name, &field.declared_type)?;
            check_default(&decl.name, field)?;

            match fields.iter_mut().find(|f| f.name == field.name) {
                Some(inherited) => {
                    if inherited.declared_type != field.declared_type {
                        return Err(Error::Schema(format!(
                            "type '{}' redeclares inherited field '{}' as {} (was {})",
                            decl.name, field.name, field.declared_type, inherited.declared_type
                        )));
                    }
                    *inherited = field.clone();
                }
                None => fields.push(field.clone()),
            }
        }

        check_recursion(&inner, &decl, &fields)?;

        let root = match &decl.parent {
            Some(parent) => inner.family_root(parent).unwrap_or_else(|| parent.clone()),
            None => decl.name.clone(),
        };

        if let Some(tag) = &decl.tag {
            if tag.is_empty() {
                return Err(Error::Schema(format!("type '{}' declares an empty tag", decl.name)));
            }
            if let Some(owner) = inner.tags.get(&root).and_then(|t| t.get(tag)) {
                return Err(Error::Schema(format!(
                    "tag '{}' of type '{}' is already used by '{}' in family '{}'",
                    tag, decl.name, owner, root
                )));
            }
        }

        let schema = Arc::new(Schema {
            name: decl.name.clone(),
            fields,
            tag: decl.tag.clone(),
            parent: decl.parent.clone(),
            hook: decl.hook,
        });

        if let Some(tag) = &decl.tag {
            inner
                .tags
                .entry(root.clone())
                .or_default()
                .insert(tag.clone(), decl.name.clone());
        }
        inner.schemas.insert(decl.name.clone(), schema.clone());
        inner.order.push(decl.name.clone());

        debug!(type_name = %decl.name, family = %root, tag = ?decl.tag, "registered type");
        Ok(schema)
    }

    /// Returns the schema of a registered type.
    pub fn lookup_schema(&self, name: &str) -> Result<Arc<Schema>> {
        self.inner
            .read()
            .schemas
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownType {
                name: name.to_string(),
                path: FieldPath::root(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().schemas.contains_key(name)
    }

    /// Names of all registered types, in registration order.
    pub fn type_names(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// The topmost ancestor of a type.
    pub fn family_root(&self, name: &str) -> Result<String> {
        self.inner
            .read()
            .family_root(name)
            .ok_or_else(|| Error::UnknownType {
                name: name.to_string(),
                path: FieldPath::root(),
            })
    }

    /// True when `sub` is `sup` or (transitively) extends it.
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        self.inner.read().is_subtype(sub, sup)
    }

    /// Resolves a tag within the family rooted at `family_root`.
    pub fn resolve_tag(&self, family_root: &str, tag: &str) -> Result<String> {
        self.inner
            .read()
            .tags
            .get(family_root)
            .and_then(|table| table.get(tag))
            .cloned()
            .ok_or_else(|| Error::UnknownTag {
                tag: tag.to_string(),
                family: family_root.to_string(),
                path: FieldPath::root(),
            })
    }

    /// Resolves a tag to a type assignable to `declared`: the declared type
    /// itself or one of its descendants.
    pub fn resolve_tag_under(&self, declared: &str, tag: &str) -> Result<String> {
        let inner = self.inner.read();
        let unknown = || Error::UnknownTag {
            tag: tag.to_string(),
            family: declared.to_string(),
            path: FieldPath::root(),
        };
        let root = inner.family_root(declared).ok_or_else(|| Error::UnknownType {
            name: declared.to_string(),
            path: FieldPath::root(),
        })?;
        let concrete = inner
            .tags
            .get(&root)
            .and_then(|table| table.get(tag))
            .ok_or_else(unknown)?;
        if inner.is_subtype(concrete, declared) {
            Ok(concrete.clone())
        } else {
            Err(unknown())
        }
    }

    /// Tags owned by `name` or any of its descendants.
    pub fn tags_under(&self, name: &str) -> Vec<String> {
        let inner = self.inner.read();
        let Some(root) = inner.family_root(name) else {
            return Vec::new();
        };
        inner
            .tags
            .get(&root)
            .map(|table| {
                table
                    .iter()
                    .filter(|(_, owner)| inner.is_subtype(owner, name))
                    .map(|(tag, _)| tag.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn dependencies(decl: &TypeDecl) -> Vec<&str> {
    let mut deps: Vec<&str> = decl.parent.iter().map(String::as_str).collect();
    for field in &decl.fields {
        deps.extend(field.declared_type.direct_struct_refs());
    }
    deps
}

fn check_declared_type(inner: &Inner, owner: &str, field: &str, ty: &DeclaredType) -> Result<()> {
    match ty {
        DeclaredType::Struct(name) => {
            if name == owner {
                return Err(Error::Schema(format!(
                    "field '{}' of '{}' references its own type outside a collection",
                    field, owner
                )));
            }
            if !inner.schemas.contains_key(name) {
                return Err(Error::Schema(format!(
                    "field '{}' of '{}' references unregistered type '{}'",
                    field, owner, name
                )));
            }
            Ok(())
        }
        DeclaredType::Union(members) => {
            if members.is_empty() {
                return Err(Error::Schema(format!(
                    "field '{}' of '{}' is declared with an empty union",
                    field, owner
                )));
            }
            for member in members {
                check_declared_type(inner, owner, field, member)?;
            }
            warn_on_ambiguous_union(owner, field, members);
            Ok(())
        }
        // Element types may be forward or self references; checked at construction
        collection @ (DeclaredType::Seq(_) | DeclaredType::Map(_, _)) => check_element_type(owner, field, collection),
        _ => Ok(()),
    }
}

/// Checks the shape of a type used inside a collection: mapping keys must be
/// primitive and unions must not be empty.
fn check_element_type(owner: &str, field: &str, ty: &DeclaredType) -> Result<()> {
    match ty {
        DeclaredType::Map(key, value) => {
            if !key.is_primitive() {
                return Err(Error::Schema(format!(
                    "field '{}' of '{}' uses {} as a mapping key; keys must be str, int, float, bool or null",
                    field, owner, key
                )));
            }
            check_element_type(owner, field, value)
        }
        DeclaredType::Seq(elem) => check_element_type(owner, field, elem),
        DeclaredType::Union(members) => {
            if members.is_empty() {
                return Err(Error::Schema(format!(
                    "field '{}' of '{}' is declared with an empty union",
                    field, owner
                )));
            }
            members
                .iter()
                .try_for_each(|member| check_element_type(owner, field, member))
        }
        _ => Ok(()),
    }
}

fn mentions_struct(ty: &DeclaredType) -> bool {
    match ty {
        DeclaredType::Struct(_) => true,
        DeclaredType::Union(members) => members.iter().any(mentions_struct),
        DeclaredType::Seq(elem) => mentions_struct(elem),
        DeclaredType::Map(key, value) => mentions_struct(key) || mentions_struct(value),
        _ => false,
    }
}

/// Coerces a default against a type that names no structured type.
///
/// Defaults that involve structured types need tag dispatch and are checked
/// when they are first built.
fn check_default(owner: &str, field: &FieldSpec) -> Result<()> {
    let Some(default) = &field.default else {
        return Ok(());
    };
    if mentions_struct(&field.declared_type) {
        return Ok(());
    }
    conform(default, &field.declared_type).map(drop).map_err(|e| {
        Error::Schema(format!(
            "default of field '{}' of '{}' does not conform to {}: {}",
            field.name, owner, field.declared_type, e
        ))
    })
}

fn conform(raw: &RawValue, ty: &DeclaredType) -> Result<Value> {
    match ty {
        DeclaredType::Union(members) => members
            .iter()
            .find_map(|member| conform(raw, member).ok())
            .ok_or_else(|| Error::NoMatch {
                union: ty.to_string(),
                found: raw.describe(),
                path: FieldPath::root(),
            }),
        DeclaredType::Seq(_) | DeclaredType::Map(_, _) => coerce_collection(raw, ty, conform),
        primitive => coerce_scalar(raw, primitive),
    }
}

/// Rejects a type whose structured fields (outside collections) lead back to
/// it. A reference reaches the named type and all of its subtypes, and the new
/// type becomes a subtype of each of its ancestors, so reaching any of them
/// closes a loop that construction could never leave.
fn check_recursion(inner: &Inner, decl: &TypeDecl, fields: &[FieldSpec]) -> Result<()> {
    let lineage = inner.lineage(&decl.name, decl.parent.as_ref());

    for field in fields {
        let mut visited: Vec<String> = Vec::new();
        let mut pending: Vec<String> = field
            .declared_type
            .direct_struct_refs()
            .into_iter()
            .map(str::to_string)
            .collect();

        while let Some(name) = pending.pop() {
            for reached in inner.subtypes_of(&name) {
                if lineage.contains(&reached) {
                    return Err(Error::Schema(format!(
                        "field '{}' of '{}' leads back to '{}' outside a collection",
                        field.name, decl.name, reached
                    )));
                }
                if visited.contains(&reached) {
                    continue;
                }
                if let Some(schema) = inner.schemas.get(&reached) {
                    for next in &schema.fields {
                        pending.extend(next.declared_type.direct_struct_refs().into_iter().map(str::to_string));
                    }
                }
                visited.push(reached);
            }
        }
    }
    Ok(())
}

fn warn_on_ambiguous_union(owner: &str, field: &str, members: &[DeclaredType]) {
    let accepts_str = members.contains(&DeclaredType::Str);
    let other_scalar_targets = members
        .iter()
        .filter(|m| matches!(m, DeclaredType::Int | DeclaredType::Float | DeclaredType::Bool | DeclaredType::Struct(_)))
        .count();
    if accepts_str && other_scalar_targets > 0 {
        warn!(
            "field '{}' of '{}' accepts 'str' alongside other types; string input that \
             also parses as another member will be rejected as ambiguous",
            field, owner
        );
    }

    let has_map = members.iter().any(|m| matches!(m, DeclaredType::Map(_, _)));
    let has_struct = members.iter().any(|m| matches!(m, DeclaredType::Struct(_)));
    if has_map && has_struct {
        warn!(
            "field '{}' of '{}' mixes a mapping type with a structured type; \
             mappings without a '{}' key may match both",
            field, owner, TAG_KEY
        );
    }
}
