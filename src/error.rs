//! Top-level error type

use thiserror::Error;

use mongorules_engine::ConfigError;
use mongorules_schema::SchemaError;

/// Errors from loading schemas and configuring models
///
/// Validation failures are not errors; they are returned as field error
/// lists in a [`PreprocessOutcome`](crate::PreprocessOutcome).
#[derive(Debug, Error)]
pub enum RulesError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No model registered for a database/collection pair
    #[error("no model registered for {db}.{collection}")]
    ModelNotFound { db: String, collection: String },
}

/// Result alias for fallible mongorules calls
pub type Result<T> = std::result::Result<T, RulesError>;
