//! Validation error records
//!
//! Preprocessing never aborts on bad input. Every violation becomes a
//! [`FieldError`] and a pass accumulates all of them in an [`ErrorSet`], so a
//! single call reports every problem at once.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in error kinds reported in [`FieldError::property`]
pub mod kind {
    /// Value missing (or null) where the rule requires one
    pub const REQUIRED: &str = "required";
    /// String or array shorter than the rule allows
    pub const MIN_LENGTH: &str = "minLength";
    /// String or array longer than the rule allows
    pub const MAX_LENGTH: &str = "maxLength";
    /// Value does not satisfy the declared type
    pub const TYPE: &str = "type";
    /// Value repeated within one array
    pub const UNIQUE: &str = "unique";
    /// Path has no rule in the schema
    pub const UNKNOWN: &str = "unknown";
}

/// A single validation failure
///
/// `property` names the rule that failed (one of [`kind`] or whatever a custom
/// validator reports). `path` is the live location of the value, including
/// array indices, so `normalize_path(path)` gives the rule's canonical path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub path: String,
}

impl FieldError {
    /// Create an error without a message
    pub fn new(property: impl Into<String>, path: impl Into<String>) -> Self {
        FieldError {
            property: property.into(),
            message: None,
            path: path.into(),
        }
    }

    /// Attach a human-readable message (builder pattern)
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn required(path: impl Into<String>) -> Self {
        FieldError::new(kind::REQUIRED, path).with_message("value is required")
    }

    pub fn min_length(path: impl Into<String>, min: usize, actual: usize) -> Self {
        FieldError::new(kind::MIN_LENGTH, path)
            .with_message(format!("length {} is below the minimum of {}", actual, min))
    }

    pub fn max_length(path: impl Into<String>, max: usize, actual: usize) -> Self {
        FieldError::new(kind::MAX_LENGTH, path)
            .with_message(format!("length {} exceeds the maximum of {}", actual, max))
    }

    pub fn type_mismatch(path: impl Into<String>, expected: impl fmt::Display) -> Self {
        FieldError::new(kind::TYPE, path).with_message(format!("expected {}", expected))
    }

    pub fn unique(path: impl Into<String>) -> Self {
        FieldError::new(kind::UNIQUE, path).with_message("value is repeated")
    }

    pub fn unknown(path: impl Into<String>) -> Self {
        FieldError::new(kind::UNKNOWN, path).with_message("field is not declared in the schema")
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} at '{}': {}", self.property, self.path, message),
            None => write!(f, "{} at '{}'", self.property, self.path),
        }
    }
}

/// Errors accumulated over a pass
///
/// Phases merge their sets into the caller's; nothing short-circuits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSet {
    errors: Vec<FieldError>,
}

impl ErrorSet {
    /// An empty set
    pub fn ok() -> Self {
        ErrorSet { errors: Vec::new() }
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Merge another set (or any error list) into this one
    pub fn merge(&mut self, other: impl IntoIterator<Item = FieldError>) {
        self.errors.extend(other);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn as_slice(&self) -> &[FieldError] {
        &self.errors
    }

    /// `None` when valid, otherwise the flat error list
    pub fn into_option(self) -> Option<Vec<FieldError>> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors)
        }
    }
}

impl IntoIterator for ErrorSet {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl From<Vec<FieldError>> for ErrorSet {
    fn from(errors: Vec<FieldError>) -> Self {
        ErrorSet { errors }
    }
}
