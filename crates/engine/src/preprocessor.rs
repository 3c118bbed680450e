//! Operation preprocessor
//!
//! A [`Preprocessor`] validates and normalizes the arguments of one
//! operation against one schema. Each cache key maps to a [`PayloadSet`]:
//! the subdocument preprocessors for every argument slot, built on first use
//! and reused by later calls with the same key.
//!
//! A pass runs in four phases under the entry's lock:
//! 1. hydrate units from the arguments
//! 2. evaluate (unknown-field checks, then every unit)
//! 3. on success, write unit values back into the arguments
//! 4. reset every unit and the pass's uniqueness memo (a drop guard runs
//!    this on every exit path)
//!
//! Every pass gets its own memo key (`cache_key#n`), so passes never share
//! uniqueness state even when an entry is invalidated mid-pass.
//!
//! Failure is closed: when any error is reported the original arguments are
//! returned untouched alongside the errors.

use mongorules_core::{extract_query_fields, unique_paths, ErrorSet, FieldError, FieldPath};
use mongorules_schema::SchemaIndex;
use serde::Serialize;
use serde_json::Value;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::{CacheStats, PreprocessCache};
use crate::config::PreprocessConfig;
use crate::operation::{parse_slots, Operation, Slot, SlotKind};
use crate::subdocument::SubdocumentPreprocessor;
use crate::unit::PassContext;

// =============================================================================
// PreprocessOutcome
// =============================================================================

/// Result of one preprocessing call
///
/// `errors` is `None` on success, in which case `args` holds the normalized
/// arguments. On failure `args` is the caller's input, unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessOutcome {
    pub errors: Option<Vec<FieldError>>,
    pub args: Vec<Value>,
}

impl PreprocessOutcome {
    fn failed(errors: Vec<FieldError>, args: Vec<Value>) -> Self {
        PreprocessOutcome {
            errors: Some(errors),
            args,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_none()
    }

    pub fn into_result(self) -> Result<Vec<Value>, Vec<FieldError>> {
        match self.errors {
            None => Ok(self.args),
            Some(errors) => Err(errors),
        }
    }
}

// =============================================================================
// PayloadSet
// =============================================================================

/// Cached subdocument preprocessors for one argument layout
pub struct PayloadSet {
    schema: Arc<SchemaIndex>,
    slots: Vec<Slot>,
    payloads: Vec<SubdocumentPreprocessor>,
    /// Memo key of the top-level pass in progress
    pass_key: Option<String>,
}

impl PayloadSet {
    /// Build one subdocument preprocessor per slot
    pub fn build(schema: &Arc<SchemaIndex>, slots: Vec<Slot>) -> Self {
        let payloads = slots
            .iter()
            .map(|slot| match slot.kind {
                SlotKind::Document => {
                    SubdocumentPreprocessor::document(Arc::clone(schema), FieldPath::root())
                }
                SlotKind::Filter => SubdocumentPreprocessor::filter(Arc::clone(schema)),
                SlotKind::Operator(op) => {
                    SubdocumentPreprocessor::operator(Arc::clone(schema), op, &slot.keys)
                }
            })
            .collect();
        PayloadSet {
            schema: Arc::clone(schema),
            slots,
            payloads,
            pass_key: None,
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn payloads(&self) -> &[SubdocumentPreprocessor] {
        &self.payloads
    }

    /// Whether this set was built for the given slot layout
    pub fn matches(&self, slots: &[Slot]) -> bool {
        self.slots == slots
    }

    pub fn hydrate(&mut self, args: &[Value]) {
        for (slot, payload) in self.slots.iter().zip(self.payloads.iter_mut()) {
            payload.hydrate(slot.value(args).unwrap_or(&Value::Null));
        }
    }

    /// Evaluate every slot
    ///
    /// A top-level pass (`root_key` empty) takes `cache_key` as its memo
    /// key and resets the schema once; `reset_payload` releases the key.
    pub fn preprocess(&mut self, cache_key: &str, root_key: &str) -> Option<Vec<FieldError>> {
        self.preprocess_as(cache_key, cache_key, root_key)
    }

    fn preprocess_as(
        &mut self,
        cache_key: &str,
        pass_key: &str,
        root_key: &str,
    ) -> Option<Vec<FieldError>> {
        if root_key.is_empty() {
            self.schema.reset(pass_key);
            self.pass_key = Some(pass_key.to_string());
        }
        let mut errors = ErrorSet::ok();
        for (slot, payload) in self.slots.iter().zip(self.payloads.iter_mut()) {
            let location = slot.location();
            let ctx = PassContext {
                schema: &self.schema,
                cache_key,
                pass_key,
                location: &location,
                scope: &location,
            };
            if let Some(slot_errors) = payload.preprocess_in(&ctx) {
                errors.merge(slot_errors);
            }
        }
        errors.into_option()
    }

    /// Write every slot's unit values back into `args`
    pub fn update_args(&self, args: &mut [Value]) {
        for (slot, payload) in self.slots.iter().zip(self.payloads.iter()) {
            if let Some(live) = slot.value_mut(args) {
                let current = live.take();
                *live = payload.update_live_value(current);
            }
        }
    }

    pub fn reset_payload(&mut self) {
        for payload in &mut self.payloads {
            payload.reset_payload();
        }
        if let Some(pass_key) = self.pass_key.take() {
            self.schema.release(&pass_key);
        }
    }
}

/// Resets a payload set when a pass ends, however it ends
struct PassGuard<'a> {
    set: &'a mut PayloadSet,
}

impl Deref for PassGuard<'_> {
    type Target = PayloadSet;

    fn deref(&self) -> &PayloadSet {
        self.set
    }
}

impl DerefMut for PassGuard<'_> {
    fn deref_mut(&mut self) -> &mut PayloadSet {
        self.set
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.set.reset_payload();
    }
}

// =============================================================================
// Preprocessor
// =============================================================================

/// Preprocessor for one operation of one collection schema
///
/// Safe to share across threads: calls with distinct cache keys run
/// concurrently, calls with the same key are serialized.
///
/// # Examples
///
/// ```
/// use mongorules_engine::{Operation, Preprocessor};
/// use mongorules_schema::SchemaIndex;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let schema = SchemaIndex::from_json(&json!({
///     "name": {"type": "string", "required": true, "transform": "lowercase"}
/// }))
/// .unwrap();
/// let pre = Preprocessor::new(Arc::new(schema), Operation::Insert);
///
/// let outcome = pre.preprocess_from_cache(vec![json!({"name": "ANN"})], "users:insert");
/// assert_eq!(outcome.args, vec![json!({"name": "ann"})]);
///
/// let outcome = pre.preprocess_from_cache(vec![json!({})], "users:insert");
/// assert_eq!(outcome.errors.unwrap()[0].property, "required");
/// ```
pub struct Preprocessor {
    schema: Arc<SchemaIndex>,
    operation: Operation,
    config: PreprocessConfig,
    cache: PreprocessCache<PayloadSet>,
    passes: AtomicU64,
}

impl Preprocessor {
    pub fn new(schema: Arc<SchemaIndex>, operation: Operation) -> Self {
        Self::with_config(schema, operation, PreprocessConfig::default())
    }

    pub fn with_config(
        schema: Arc<SchemaIndex>,
        operation: Operation,
        config: PreprocessConfig,
    ) -> Self {
        let cache = PreprocessCache::new(config.max_cache_entries);
        Preprocessor {
            schema,
            operation,
            config,
            cache,
            passes: AtomicU64::new(0),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn schema(&self) -> &Arc<SchemaIndex> {
        &self.schema
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Validate and normalize `args`, reusing the payload set for `cache_key`
    pub fn preprocess_from_cache(&self, args: Vec<Value>, cache_key: &str) -> PreprocessOutcome {
        let slots = match parse_slots(self.operation, &args) {
            Ok(slots) => slots,
            Err(errors) => {
                tracing::debug!(
                    target: "mongorules::preprocess",
                    cache_key,
                    operation = %self.operation,
                    errors = errors.len(),
                    "Rejected malformed arguments"
                );
                return PreprocessOutcome::failed(errors, args);
            }
        };

        let handle = self
            .cache
            .get_or_insert_with(cache_key, || PayloadSet::build(&self.schema, slots.clone()));
        let mut entry = handle.lock();
        if !entry.matches(&slots) {
            tracing::warn!(
                target: "mongorules::preprocess",
                cache_key,
                operation = %self.operation,
                "Argument layout changed for cache key, rebuilding payloads"
            );
            *entry = PayloadSet::build(&self.schema, slots);
        }

        let pass_key = format!("{}#{}", cache_key, self.passes.fetch_add(1, Ordering::Relaxed));
        let mut pass = PassGuard { set: &mut *entry };
        pass.hydrate(&args);
        let mut errors = self.unknown_fields(pass.slots(), &args);
        if let Some(unit_errors) = pass.preprocess_as(cache_key, &pass_key, "") {
            errors.merge(unit_errors);
        }

        if !errors.is_valid() {
            tracing::debug!(
                target: "mongorules::preprocess",
                cache_key,
                operation = %self.operation,
                slots = pass.slots().len(),
                errors = errors.len(),
                "Preprocess pass failed"
            );
            return PreprocessOutcome::failed(errors.into_iter().collect(), args);
        }

        let mut args = args;
        pass.update_args(&mut args);
        tracing::debug!(
            target: "mongorules::preprocess",
            cache_key,
            operation = %self.operation,
            slots = pass.slots().len(),
            upsert = self.operation.is_upsert(&args),
            "Preprocess pass complete"
        );
        PreprocessOutcome { errors: None, args }
    }

    /// Drop the cached payload set for `cache_key`
    pub fn invalidate(&self, cache_key: &str) -> bool {
        self.cache.invalidate(cache_key)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn is_cached(&self, cache_key: &str) -> bool {
        self.cache.contains(cache_key)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // Paths the schema does not cover, one error per distinct path per slot.
    fn unknown_fields(&self, slots: &[Slot], args: &[Value]) -> ErrorSet {
        let mut errors = ErrorSet::ok();
        if !self.config.reject_unknown_fields {
            return errors;
        }
        for slot in slots {
            let Some(live) = slot.value(args) else {
                continue;
            };
            let paths = match slot.kind {
                SlotKind::Filter => extract_query_fields(live, None),
                SlotKind::Document | SlotKind::Operator(_) => unique_paths(live),
            };
            let location = slot.location();
            for path in paths {
                if self.config.is_implicit(&path) || self.schema.resolves(&FieldPath::normalize(&path)) {
                    continue;
                }
                errors.push(FieldError::unknown(mongorules_core::join_live(&location, &path)));
            }
        }
        errors
    }
}

impl std::fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preprocessor")
            .field("operation", &self.operation)
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .finish()
    }
}
