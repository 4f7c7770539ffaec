// hypod library entry point
//
// Type-directed construction of nested hyperparameter records from raw
// mappings, tag strings, YAML files and dotted command-line tokens.

pub mod cli;
pub mod coerce;
pub mod construct;
pub mod internal;
pub mod schema;
pub mod value;

pub use crate::cli::{init_logging, parse_tokens, LaunchArgs, Launcher};
pub use crate::construct::{Draft, Engine, Hypod, PostConstructHook};
pub use crate::internal::{Error, FieldPath, Result};
pub use crate::schema::{global, DeclaredType, Declaration, SchemaRegistry, TypeDecl, DECLARATIONS, TAG_KEY};
pub use crate::value::{RawMap, RawValue, Record, Value};
