// Value module for hypod
//
// Raw (untyped) input values, constructed (typed) values, immutable records,
// and the loaders that turn YAML/JSON documents into raw values.

pub use self::record::Record;
pub use self::types::{RawMap, RawValue, Value};

pub mod record;
pub mod source;
pub mod types;
