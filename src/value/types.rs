// Raw and constructed value types for hypod
//
// `RawValue` is what loaders and the CLI parser produce: untyped scalars, sequences
// and mappings, or an instance that was already built. `Value` is what a
// constructed record holds: every field value conforms to its declared type.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::value::record::Record;

/// Insertion-ordered mapping of field names (or map keys) to raw values.
pub type RawMap = IndexMap<String, RawValue>;

/// Untyped input, not yet validated against a declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<RawValue>),
    Map(RawMap),
    /// An already-constructed record.
    Instance(Arc<Record>),
}

impl RawValue {
    /// Builds a mapping from `(key, value)` pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RawValue)>,
    {
        RawValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// An empty mapping.
    pub fn empty_map() -> Self {
        RawValue::Map(RawMap::new())
    }

    /// Builds a sequence.
    pub fn seq<I: IntoIterator<Item = RawValue>>(items: I) -> Self {
        RawValue::Seq(items.into_iter().collect())
    }

    /// Short name of the value's shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Bool(_) => "bool",
            RawValue::Int(_) => "int",
            RawValue::Float(_) => "float",
            RawValue::Str(_) => "string",
            RawValue::Seq(_) => "sequence",
            RawValue::Map(_) => "mapping",
            RawValue::Instance(_) => "instance",
        }
    }

    /// True for null, bool, numbers and strings.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            RawValue::Null | RawValue::Bool(_) | RawValue::Int(_) | RawValue::Float(_) | RawValue::Str(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&RawMap> {
        match self {
            RawValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// A compact rendering of the value for error messages.
    pub fn describe(&self) -> String {
        match self {
            RawValue::Null => "null".to_string(),
            RawValue::Bool(b) => b.to_string(),
            RawValue::Int(i) => i.to_string(),
            RawValue::Float(x) => format!("{:?}", x),
            RawValue::Str(s) => format!("{:?}", s),
            RawValue::Seq(items) => format!("sequence of {}", items.len()),
            RawValue::Map(m) => {
                let keys: Vec<&str> = m.keys().map(String::as_str).collect();
                format!("mapping {{{}}}", keys.join(", "))
            }
            RawValue::Instance(r) => format!("instance of '{}'", r.type_name()),
        }
    }

    /// Deep-merges `update` into `self`.
    ///
    /// Mapping onto mapping merges key-wise and recurses; anything else replaces.
    pub fn deep_merge(&mut self, update: RawValue) {
        match (self, update) {
            (RawValue::Map(base), RawValue::Map(update)) => {
                for (key, value) in update {
                    match base.get_mut(&key) {
                        Some(existing @ RawValue::Map(_)) => existing.deep_merge(value),
                        _ => {
                            base.insert(key, value);
                        }
                    }
                }
            }
            (slot, update) => *slot = update,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Str(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Str(s)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Int(i)
    }
}

impl From<i32> for RawValue {
    fn from(i: i32) -> Self {
        RawValue::Int(i64::from(i))
    }
}

impl From<f64> for RawValue {
    fn from(x: f64) -> Self {
        RawValue::Float(x)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<Vec<RawValue>> for RawValue {
    fn from(items: Vec<RawValue>) -> Self {
        RawValue::Seq(items)
    }
}

impl From<RawMap> for RawValue {
    fn from(map: RawMap) -> Self {
        RawValue::Map(map)
    }
}

impl From<Arc<Record>> for RawValue {
    fn from(record: Arc<Record>) -> Self {
        RawValue::Instance(record)
    }
}

impl From<Record> for RawValue {
    fn from(record: Record) -> Self {
        RawValue::Instance(Arc::new(record))
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Int(i) => RawValue::Int(i),
            Value::Float(x) => RawValue::Float(x),
            Value::Str(s) => RawValue::Str(s),
            Value::Seq(items) => RawValue::Seq(items.into_iter().map(RawValue::from).collect()),
            Value::Map(entries) => RawValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.key_string(), RawValue::from(v)))
                    .collect(),
            ),
            Value::Record(r) => RawValue::Instance(r),
        }
    }
}

/// A value that conforms to its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<Value>),
    /// Mapping with coerced keys, in source order.
    Map(Vec<(Value, Value)>),
    Record(Arc<Record>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Arc<Record>> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the runtime type, used in error messages.
    pub fn kind_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "mapping",
            Value::Record(r) => r.type_name(),
        }
    }

    /// Renders a primitive value as a mapping key.
    pub(crate) fn key_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Float(x) => format!("{:?}", x),
            other => other.to_string(),
        }
    }

    pub(crate) fn write(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.write(f, indent)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    k.write(f, indent)?;
                    write!(f, ": ")?;
                    v.write(f, indent)?;
                }
                write!(f, "}}")
            }
            Value::Record(r) => r.write(f, indent),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, 0)
    }
}

impl From<Arc<Record>> for Value {
    fn from(record: Arc<Record>) -> Self {
        Value::Record(record)
    }
}
