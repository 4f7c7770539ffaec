//! Load-time type declarations.
//!
//! Structured types are declared next to the code that uses them by adding a
//! [`Declaration`] to the [`DECLARATIONS`] slice with `linkme`. The process-wide
//! registry is built from the slice on first use:
//!
//! ```ignore
//! use hypod::schema::{DeclaredType, TypeDecl, DECLARATIONS, Declaration};
//! use linkme::distributed_slice;
//!
//! #[distributed_slice(DECLARATIONS)]
//! static LAYER: Declaration = Declaration {
//!     name: "Layer",
//!     declare: || {
//!         TypeDecl::new("Layer")
//!             .field("in", DeclaredType::Int)
//!             .field("out", DeclaredType::Int)
//!             .field_default("scale", DeclaredType::Float, 0.9)
//!     },
//! };
//! ```

use linkme::distributed_slice;
use once_cell::sync::OnceCell;

use crate::internal::error::{Error, Result};
use crate::schema::registry::SchemaRegistry;
use crate::schema::types::TypeDecl;

/// A structured type declared at load time.
#[derive(Clone, Copy)]
pub struct Declaration {
    /// Type name, for diagnostics before the declaration is built.
    pub name: &'static str,
    /// Builds the declaration.
    pub declare: fn() -> TypeDecl,
}

impl Declaration {
    /// Builds the declaration, checking that it declares the type it is listed under.
    pub fn build(&self) -> Result<TypeDecl> {
        let decl = (self.declare)();
        if decl.name != self.name {
            return Err(Error::Schema(format!(
                "declaration listed as '{}' builds type '{}'",
                self.name, decl.name
            )));
        }
        Ok(decl)
    }
}

impl std::fmt::Debug for Declaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Declaration").field("name", &self.name).finish()
    }
}

/// Registry of all load-time declarations.
#[distributed_slice]
pub static DECLARATIONS: [Declaration];

static GLOBAL: OnceCell<SchemaRegistry> = OnceCell::new();

/// The process-wide registry, built once from [`DECLARATIONS`].
///
/// A bad declaration is a `SchemaError` on every call; there is no partial registry.
pub fn global() -> Result<&'static SchemaRegistry> {
    GLOBAL.get_or_try_init(|| {
        tracing::debug!(count = DECLARATIONS.len(), "building global schema registry");
        let decls = DECLARATIONS
            .iter()
            .map(Declaration::build)
            .collect::<Result<Vec<_>>>()?;
        SchemaRegistry::from_declarations(decls)
    })
}

/// Looks up a load-time declaration by type name.
pub fn find_declaration(name: &str) -> Option<&'static Declaration> {
    DECLARATIONS.iter().find(|d| d.name == name)
}
