//! Schema layer for mongorules
//!
//! A schema is a flattened mapping from canonical dot-paths to field rules:
//!
//! ```json
//! {
//!   "account.friends": { "type": ["object"], "minLength": 1 },
//!   "account.friends.name": { "type": "string", "required": true }
//! }
//! ```
//!
//! Rules carry declarative constraints (type, required, length bounds,
//! default, sanitize, unique) and optional transform/validate callables.

#![warn(clippy::all)]

pub mod error;
pub mod index;
pub mod rule;
pub mod types;

pub use error::SchemaError;
pub use index::{SchemaBuilder, SchemaEntry, SchemaIndex};
pub use rule::{
    builtin_transform, sanitize_value, FieldRule, FieldSpec, Transform, Validate,
    ValidationContext,
};
pub use types::FieldType;
