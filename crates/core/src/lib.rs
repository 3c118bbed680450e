//! Core path algebra for mongorules
//!
//! This crate converts between live document/query keys and the canonical
//! dot-paths that schemas are indexed by:
//! - path: FieldPath, normalization, payload flattening, live value access
//! - query: field extraction from Mongo-style filters
//! - operator: the closed `$`-operator vocabulary
//! - error: FieldError records and the ErrorSet accumulator
//!
//! Nothing in this crate fails: malformed input normalizes to a best-effort
//! result.

#![warn(clippy::all)]

pub mod error;
pub mod operator;
pub mod path;
pub mod query;

pub use error::{kind, ErrorSet, FieldError};
pub use operator::{is_operator_key, Operator, UpdateClass};
pub use path::{
    flatten_document, get_at, join_live, normalize_path, set_at, strip_update_markers,
    unique_paths, FieldPath,
};
pub use query::{extract_query_fields, is_object_id};
