//! Preprocessor configuration
//!
//! Built with chained setters or loaded from TOML:
//!
//! ```toml
//! reject_unknown_fields = true
//! implicit_fields = ["_id", "createdAt"]
//! max_cache_entries = 512
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading a [`PreprocessConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML did not parse or carried unknown keys
    #[error("invalid preprocessor configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A cache must hold at least one entry
    #[error("max_cache_entries must be at least 1")]
    ZeroCacheCapacity,
}

/// Options for a [`Preprocessor`](crate::Preprocessor).
///
/// ```
/// use mongorules_engine::PreprocessConfig;
///
/// let config = PreprocessConfig::new()
///     .reject_unknown_fields(false)
///     .implicit_field("createdAt");
/// assert!(config.is_implicit("createdAt"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessConfig {
    /// Report fields the schema does not cover as `unknown` errors
    pub reject_unknown_fields: bool,
    /// Top-level fields accepted without a rule (and everything beneath them)
    pub implicit_fields: Vec<String>,
    /// Cached payload sets kept before idle ones are evicted
    pub max_cache_entries: usize,
}

impl PreprocessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_unknown_fields(mut self, reject: bool) -> Self {
        self.reject_unknown_fields = reject;
        self
    }

    /// Accept `name` (and paths beneath it) without a schema rule
    pub fn implicit_field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.implicit_fields.contains(&name) {
            self.implicit_fields.push(name);
        }
        self
    }

    pub fn max_cache_entries(mut self, max: usize) -> Self {
        self.max_cache_entries = max;
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: PreprocessConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cache_entries == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        Ok(())
    }

    /// Whether a canonical path is an implicit field or lies beneath one
    pub fn is_implicit(&self, path: &str) -> bool {
        self.implicit_fields.iter().any(|field| {
            path == field
                || (path.starts_with(field.as_str())
                    && path[field.len()..].starts_with(mongorules_core::path::PATH_SEP))
        })
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            reject_unknown_fields: true,
            implicit_fields: vec!["_id".to_string()],
            max_cache_entries: 1024,
        }
    }
}
