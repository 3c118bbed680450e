//! Preprocessing engine for mongorules
//!
//! Validates and normalizes the arguments of collection operations against a
//! [`SchemaIndex`](mongorules_schema::SchemaIndex):
//! - operation: operations, argument slots and shape-derived cache keys
//! - unit: one rule bound to one payload location
//! - subdocument: the unit layout for one payload
//! - preprocessor: the per-operation orchestrator and its cached payload sets
//! - cache: the keyed, per-entry locked store behind the orchestrator
//! - modifiers: `$each` modifier detach/reattach
//! - config: preprocessor options
//!
//! Validation failures are data ([`FieldError`](mongorules_core::FieldError)
//! lists), never `Err`.

#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod modifiers;
pub mod operation;
pub mod preprocessor;
pub mod subdocument;
pub mod unit;

pub use cache::{CacheStats, PreprocessCache};
pub use config::{ConfigError, PreprocessConfig};
pub use modifiers::{extract_modifiers, Modifier};
pub use operation::{cache_key_for, parse_slots, Operation, Slot, SlotKind};
pub use preprocessor::{PayloadSet, PreprocessOutcome, Preprocessor};
pub use subdocument::{Layout, SubdocumentPreprocessor};
pub use unit::{Locator, PassContext, PayloadUnit, UnitMode};
