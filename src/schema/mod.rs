// Schema module for hypod
//
// This module provides the schema model for structured types. It includes:
//
// 1. Declared types (primitives, structured references, unions, collections)
// 2. Field specifications with raw defaults
// 3. The registry with per-family tag tables
// 4. Load-time declarations and the process-wide registry

// Re-export public types and functions
pub use self::declare::{find_declaration, global, Declaration, DECLARATIONS};
pub use self::registry::SchemaRegistry;
pub use self::types::{DeclaredType, FieldSpec, Schema, TypeDecl, TAG_KEY};

// Sub-modules
pub mod declare;
pub mod registry;
pub mod types;
