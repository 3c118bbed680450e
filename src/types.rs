//! Public types for the mongorules API.
//!
//! This module re-exports types from the workspace crates with one flat
//! interface.

// ============================================================================
// Paths and errors
// ============================================================================

pub use mongorules_core::{kind, ErrorSet, FieldError, FieldPath, Operator};

// ============================================================================
// Schema
// ============================================================================

pub use mongorules_schema::{
    FieldRule, FieldType, SchemaBuilder, SchemaError, SchemaIndex, Transform, Validate,
    ValidationContext,
};

// ============================================================================
// Preprocessing
// ============================================================================

pub use mongorules_engine::{
    cache_key_for, CacheStats, ConfigError, Modifier, Operation, PreprocessConfig,
    PreprocessOutcome, Preprocessor,
};
