//! Schema loading errors

use thiserror::Error;

/// Error type for building a [`SchemaIndex`](crate::SchemaIndex)
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Input was not valid JSON
    #[error("schema is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Top-level schema value was not an object
    #[error("schema must be an object mapping paths to rules")]
    NotAnObject,

    /// A rule's `type` could not be parsed
    #[error("invalid type for '{path}': {found}")]
    InvalidType { path: String, found: String },

    /// A rule's key carries indices, operators or empty segments
    #[error("'{path}' is not a canonical path")]
    InvalidPath { path: String },

    /// Two rules were declared for one path
    #[error("duplicate rule for '{path}'")]
    DuplicatePath { path: String },

    /// A callable was attached to a path with no rule
    #[error("no rule declared for '{path}'")]
    UnknownPath { path: String },

    /// A rule named a transform that does not exist
    #[error("unknown transform '{name}' for '{path}'")]
    UnknownTransform { path: String, name: String },

    /// A rule's constraints contradict each other
    #[error("invalid rule for '{path}': {message}")]
    InvalidRule { path: String, message: String },
}
