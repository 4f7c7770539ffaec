// Internal module for crate-wide plumbing shared by every other module.

pub mod error;

pub use self::error::{Error, FieldPath, Result};
