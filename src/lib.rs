//! # mongorules
//!
//! Schema-driven preprocessing for Mongo-style documents, queries and update
//! payloads. Arguments are validated against a flattened schema, defaults and
//! transforms are applied, and the normalized arguments are returned; any
//! violation returns the original arguments with a list of field errors.
//!
//! ```
//! use mongorules::{ModelRegistry, Operation};
//! use serde_json::json;
//!
//! let registry = ModelRegistry::new();
//! let users = registry
//!     .add_model_json("app", "users", &json!({
//!         "name": {"type": "string", "required": true, "transform": "lowercase"},
//!         "tags": {"type": ["string"], "default": []}
//!     }))
//!     .unwrap();
//!
//! let outcome = users.preprocess(Operation::Insert, vec![json!({"name": "ANN"})]);
//! assert_eq!(outcome.args, vec![json!({"name": "ann", "tags": []})]);
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod registry;
pub mod types;

pub use error::{Result, RulesError};
pub use registry::{Model, ModelRegistry};
pub use types::*;
