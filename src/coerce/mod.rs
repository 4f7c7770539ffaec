// Coercion module for hypod
//
// Leaf conversions used by the construction engine: raw scalars to declared
// primitives, and raw sequences/mappings to declared collection types.

pub use self::collection::coerce_collection;
pub use self::scalar::coerce_scalar;

pub mod collection;
pub mod scalar;
