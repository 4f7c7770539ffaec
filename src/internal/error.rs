use std::fmt;
use std::io;

use thiserror::Error;

/// Dot-separated location of a value inside the object graph being built.
///
/// Sequence elements contribute their index as a segment, so the third layer of a
/// `layers` field is reported as `layers.2`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// The root of the graph (empty path).
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a path from a dotted string such as `model.net.n`.
    pub fn parse(dotted: &str) -> Self {
        Self {
            segments: dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path segments from the root downwards.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Prepends a parent segment.
    pub fn prepend(&mut self, segment: impl Into<String>) {
        self.segments.insert(0, segment.into());
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

/// Unified error type for the hypod library.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad type declaration. Raised while the registry is populated; never recovered.
    #[error("Schema Error: {0}")]
    Schema(String),

    /// A structured type name was never registered.
    #[error("Unknown Type Error at '{path}': type '{name}' is not registered")]
    UnknownType { name: String, path: FieldPath },

    /// No type in the family (below the declared type) owns the tag.
    #[error("Unknown Tag Error at '{path}': no subtype of '{family}' is tagged '{tag}'")]
    UnknownTag {
        tag: String,
        family: String,
        path: FieldPath,
    },

    /// A scalar could not be converted to the declared primitive.
    #[error("Coercion Error at '{path}': cannot convert {value} to {expected}: {reason}")]
    Coercion {
        value: String,
        expected: String,
        reason: String,
        path: FieldPath,
    },

    /// The raw value has the wrong shape (e.g. a scalar where a sequence is declared).
    #[error("Shape Error at '{path}': expected {expected}, found {found}")]
    Shape {
        expected: String,
        found: String,
        path: FieldPath,
    },

    /// More than one union member could accept the raw value.
    #[error("Ambiguous Union Error at '{path}': {found} matches several members of {union}: {}", .candidates.join(", "))]
    AmbiguousUnion {
        union: String,
        found: String,
        candidates: Vec<String>,
        path: FieldPath,
    },

    /// No union member accepts the raw value.
    #[error("No Match Error at '{path}': {found} matches no member of {union}")]
    NoMatch {
        union: String,
        found: String,
        path: FieldPath,
    },

    /// A required field was neither given nor defaulted.
    #[error("Missing Field Error at '{path}': field '{field}' of '{owner}' has no value and no default")]
    MissingField {
        field: String,
        owner: String,
        path: FieldPath,
    },

    /// A mapping key does not name any field of the type.
    #[error("Unknown Field Error at '{path}': '{owner}' has no field '{field}'{}", suggestion_suffix(.suggestion))]
    UnknownField {
        field: String,
        owner: String,
        suggestion: Option<String>,
        path: FieldPath,
    },

    /// Two CLI tokens assign different values to the same dotted path.
    #[error("Duplicate Key Error: '{key}' is assigned both '{first}' and '{second}'")]
    DuplicateKey {
        key: String,
        first: String,
        second: String,
    },

    /// One CLI token's path is a strict prefix of another's.
    #[error("Conflicting Path Error: '{prefix}' is both a value and the parent of '{longer}'")]
    ConflictingPath { prefix: String, longer: String },

    /// A CLI token is not of the form `key=value`.
    #[error("Malformed Token Error: '{0}' should be of the form 'foo.bar=baz'")]
    MalformedToken(String),

    /// Launcher options could not be parsed.
    #[error("Usage Error: {0}")]
    Usage(String),

    /// A post-construction hook rejected the instance.
    #[error("Post Construction Error at '{path}': hook of '{owner}' failed: {message}")]
    PostConstruction {
        owner: String,
        message: String,
        path: FieldPath,
    },

    /// Reading or parsing an external mapping source failed.
    #[error("Source Error ({origin}): {message}")]
    Source { origin: String, message: String },
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

impl Error {
    /// Location of the failure, when the error is tied to one.
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            Error::UnknownType { path, .. }
            | Error::UnknownTag { path, .. }
            | Error::Coercion { path, .. }
            | Error::Shape { path, .. }
            | Error::AmbiguousUnion { path, .. }
            | Error::NoMatch { path, .. }
            | Error::MissingField { path, .. }
            | Error::UnknownField { path, .. }
            | Error::PostConstruction { path, .. } => Some(path),
            _ => None,
        }
    }

    fn path_mut(&mut self) -> Option<&mut FieldPath> {
        match self {
            Error::UnknownType { path, .. }
            | Error::UnknownTag { path, .. }
            | Error::Coercion { path, .. }
            | Error::Shape { path, .. }
            | Error::AmbiguousUnion { path, .. }
            | Error::NoMatch { path, .. }
            | Error::MissingField { path, .. }
            | Error::UnknownField { path, .. }
            | Error::PostConstruction { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Prepends `segment` to the error's field path. Errors without a path pass through.
    pub fn within(mut self, segment: impl Into<String>) -> Self {
        if let Some(path) = self.path_mut() {
            path.prepend(segment);
        }
        self
    }
}

/// A specialized `Result` type for hypod operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Source {
            origin: "io".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Source {
            origin: "yaml".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Source {
            origin: "json".to_string(),
            message: err.to_string(),
        }
    }
}
