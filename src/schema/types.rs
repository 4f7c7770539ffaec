// Schema type system for hypod
//
// This module defines declared types (the type expressions fields are annotated
// with), field specifications, and the per-type schema the registry stores.

use std::fmt;

use crate::construct::hook::PostConstructHook;
use crate::value::types::RawValue;

/// Reserved mapping key naming the concrete subtype explicitly.
pub const TAG_KEY: &str = "_tag";

/// A type expression a field is declared with.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredType {
    /// UTF-8 string
    Str,
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// Boolean
    Bool,
    /// The null value (used to build optional types)
    Null,
    /// Reference to a registered structured type, by name
    Struct(String),
    /// One of several types
    Union(Vec<DeclaredType>),
    /// Sequence of one element type
    Seq(Box<DeclaredType>),
    /// Mapping with typed keys and values
    Map(Box<DeclaredType>, Box<DeclaredType>),
}

impl DeclaredType {
    /// Reference to a structured type.
    pub fn structured(name: impl Into<String>) -> Self {
        DeclaredType::Struct(name.into())
    }

    /// Sequence of `elem`.
    pub fn seq(elem: DeclaredType) -> Self {
        DeclaredType::Seq(Box::new(elem))
    }

    /// Mapping of `key` to `value`.
    pub fn map(key: DeclaredType, value: DeclaredType) -> Self {
        DeclaredType::Map(Box::new(key), Box::new(value))
    }

    /// Union of `members`. Nested unions are flattened and duplicates dropped,
    /// keeping declaration order.
    pub fn union<I: IntoIterator<Item = DeclaredType>>(members: I) -> Self {
        let mut flat: Vec<DeclaredType> = Vec::new();
        for member in members {
            match member {
                DeclaredType::Union(inner) => {
                    for m in inner {
                        if !flat.contains(&m) {
                            flat.push(m);
                        }
                    }
                }
                m => {
                    if !flat.contains(&m) {
                        flat.push(m);
                    }
                }
            }
        }
        DeclaredType::Union(flat)
    }

    /// `ty` or null.
    pub fn optional(ty: DeclaredType) -> Self {
        Self::union([ty, DeclaredType::Null])
    }

    /// Returns true for str, int, float, bool and null.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            DeclaredType::Str | DeclaredType::Int | DeclaredType::Float | DeclaredType::Bool | DeclaredType::Null
        )
    }

    /// Returns true for sequence and mapping types.
    pub fn is_collection(&self) -> bool {
        matches!(self, DeclaredType::Seq(_) | DeclaredType::Map(_, _))
    }

    /// Structured type names referenced directly, i.e. not through a collection.
    pub fn direct_struct_refs(&self) -> Vec<&str> {
        match self {
            DeclaredType::Struct(name) => vec![name.as_str()],
            DeclaredType::Union(members) => members.iter().flat_map(|m| m.direct_struct_refs()).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredType::Str => write!(f, "str"),
            DeclaredType::Int => write!(f, "int"),
            DeclaredType::Float => write!(f, "float"),
            DeclaredType::Bool => write!(f, "bool"),
            DeclaredType::Null => write!(f, "null"),
            DeclaredType::Struct(name) => write!(f, "{}", name),
            DeclaredType::Union(members) => {
                let parts: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "{}", parts.join(" | "))
            }
            DeclaredType::Seq(elem) => write!(f, "list[{}]", elem),
            DeclaredType::Map(k, v) => write!(f, "dict[{}, {}]", k, v),
        }
    }
}

/// Represents a field of a structured type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Field name
    pub name: String,
    /// Declared type
    pub declared_type: DeclaredType,
    /// Default, as a raw value run through the same coercion as explicit input
    pub default: Option<RawValue>,
}

impl FieldSpec {
    /// A field without a default.
    pub fn required(name: impl Into<String>, declared_type: DeclaredType) -> Self {
        Self {
            name: name.into(),
            declared_type,
            default: None,
        }
    }

    /// A field with a default.
    pub fn with_default(
        name: impl Into<String>,
        declared_type: DeclaredType,
        default: impl Into<RawValue>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_type,
            default: Some(default.into()),
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// The resolved schema of one structured type
#[derive(Clone)]
pub struct Schema {
    /// Type identity
    pub name: String,
    /// Fields in stable order: inherited first, then own
    pub fields: Vec<FieldSpec>,
    /// Tag within the polymorphic family, if any
    pub tag: Option<String>,
    /// The base type this one extends, if any
    pub parent: Option<String>,
    /// Hook run after the fields are resolved
    pub hook: Option<PostConstructHook>,
}

impl Schema {
    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the fields without a default.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| !f.has_default())
            .map(|f| f.name.as_str())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("tag", &self.tag)
            .field("parent", &self.parent)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

/// A declaration of a structured type, as handed to the registry.
#[derive(Clone)]
pub struct TypeDecl {
    pub name: String,
    pub parent: Option<String>,
    pub tag: Option<String>,
    /// The type's own fields (inherited fields come from the parent's schema)
    pub fields: Vec<FieldSpec>,
    pub hook: Option<PostConstructHook>,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            tag: None,
            fields: Vec::new(),
            hook: None,
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, declared_type: DeclaredType) -> Self {
        self.fields.push(FieldSpec::required(name, declared_type));
        self
    }

    pub fn field_default(
        mut self,
        name: impl Into<String>,
        declared_type: DeclaredType,
        default: impl Into<RawValue>,
    ) -> Self {
        self.fields.push(FieldSpec::with_default(name, declared_type, default));
        self
    }

    pub fn hook(mut self, hook: PostConstructHook) -> Self {
        self.hook = Some(hook);
        self
    }
}

impl fmt::Debug for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDecl")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("tag", &self.tag)
            .field("fields", &self.fields)
            .finish()
    }
}
