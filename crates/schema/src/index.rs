//! Path-indexed schema
//!
//! [`SchemaIndex`] maps canonical paths to [`FieldRule`]s in declaration
//! order and answers the lookups the preprocessor needs:
//! - `descriptor_at`: the rule for one path
//! - `subschema_at`: every rule beneath a path, optionally depth-bounded
//! - `resolves`: whether a live path is covered by the schema at all
//!
//! It also owns per-pass state (the uniqueness memo), cleared by `reset`.

use indexmap::IndexMap;
use mongorules_core::FieldPath;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::rule::{FieldRule, FieldSpec, Transform, Validate, ValidationContext};
use crate::types::FieldType;
use mongorules_core::FieldError;

/// One schema rule and its parsed path
#[derive(Debug, Clone)]
pub struct SchemaEntry {
    path: FieldPath,
    rule: Arc<FieldRule>,
}

impl SchemaEntry {
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn rule(&self) -> &Arc<FieldRule> {
        &self.rule
    }
}

/// Read-only mapping from canonical path to field rule
#[derive(Debug, Default)]
pub struct SchemaIndex {
    entries: IndexMap<String, SchemaEntry>,
    /// cache key -> (scope, serialized value) pairs seen this pass
    seen: Mutex<FxHashMap<String, FxHashSet<(String, String)>>>,
}

impl SchemaIndex {
    /// Start building a schema
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Build a schema from a flattened JSON object of rule declarations
    pub fn from_json(value: &Value) -> Result<Self, SchemaError> {
        SchemaBuilder::from_json(value)?.build()
    }

    /// Parse and build a schema from JSON text
    pub fn from_json_str(s: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_json(&value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in declaration order
    pub fn entries(&self) -> impl Iterator<Item = &SchemaEntry> {
        self.entries.values()
    }

    /// Rule declared for exactly this canonical path
    pub fn descriptor_at(&self, path: &str) -> Option<&Arc<FieldRule>> {
        self.entries.get(path).map(|entry| &entry.rule)
    }

    /// Entries strictly beneath `path`, in declaration order
    ///
    /// With `depth`, only entries at most `depth` segments below `path` are
    /// returned. The root path (`""`) selects the whole schema.
    pub fn subschema_at(&self, path: &str, depth: Option<usize>) -> Vec<&SchemaEntry> {
        let root = FieldPath::normalize(path);
        self.entries
            .values()
            .filter(|entry| root.is_strict_ancestor_of(&entry.path))
            .filter(|entry| depth.map_or(true, |d| entry.path.len() <= root.len() + d))
            .collect()
    }

    /// Whether any rule is declared beneath `path`
    pub fn has_descendants(&self, path: &FieldPath) -> bool {
        self.entries
            .values()
            .any(|entry| path.is_strict_ancestor_of(&entry.path))
    }

    /// Whether a canonical path is covered by the schema
    ///
    /// A path is covered when it has its own rule, or when its nearest declared
    /// ancestor is open (has no rules beneath it), i.e. holds free-form data.
    pub fn resolves(&self, path: &FieldPath) -> bool {
        if path.is_root() || self.entries.contains_key(&path.to_path_string()) {
            return true;
        }
        for ancestor in path.ancestors() {
            if self.entries.contains_key(&ancestor.to_path_string()) {
                return !self.has_descendants(&ancestor);
            }
        }
        false
    }

    /// Clear per-pass state for one pass key
    ///
    /// Called exactly once at the start of every top-level pass.
    pub fn reset(&self, cache_key: &str) {
        self.seen.lock().remove(cache_key);
    }

    /// Drop everything recorded by a finished pass
    pub fn release(&self, pass_key: &str) {
        if self.seen.lock().remove(pass_key).is_some() {
            tracing::trace!(target: "mongorules::schema", pass_key, "Released uniqueness memo");
        }
    }

    /// Number of pass keys currently holding uniqueness state
    pub fn open_passes(&self) -> usize {
        self.seen.lock().len()
    }

    /// Record a value for a uniqueness scope within the current pass
    ///
    /// Returns `true` the first time a value is seen in `scope`, `false` for
    /// repeats.
    pub fn record_unique(&self, cache_key: &str, scope: &str, value: &Value) -> bool {
        let mut seen = self.seen.lock();
        seen.entry(cache_key.to_string())
            .or_default()
            .insert((scope.to_string(), value.to_string()))
    }
}

/// Builder for [`SchemaIndex`]
///
/// Rules are kept in insertion order. Errors are collected and reported by
/// [`SchemaBuilder::build`].
#[derive(Default)]
pub struct SchemaBuilder {
    rules: IndexMap<String, FieldRule>,
    errors: Vec<SchemaError>,
}

impl SchemaBuilder {
    /// Load rule declarations from a flattened JSON object
    pub fn from_json(value: &Value) -> Result<Self, SchemaError> {
        let map = value.as_object().ok_or(SchemaError::NotAnObject)?;
        let mut builder = SchemaBuilder::default();
        for (path, spec) in map {
            let spec: FieldSpec = serde_json::from_value(spec.clone())?;
            let rule = spec.into_rule(path)?;
            builder = builder.field(path, rule);
        }
        Ok(builder)
    }

    /// Declare a rule for a canonical path
    pub fn field(mut self, path: &str, rule: FieldRule) -> Self {
        if path.is_empty() || FieldPath::normalize(path).to_path_string() != path {
            self.errors.push(SchemaError::InvalidPath {
                path: path.to_string(),
            });
        } else if self.rules.contains_key(path) {
            self.errors.push(SchemaError::DuplicatePath {
                path: path.to_string(),
            });
        } else {
            self.rules.insert(path.to_string(), rule);
        }
        self
    }

    /// Attach a transform closure to an already declared path
    pub fn transform<F>(self, path: &str, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let transform: Arc<dyn Transform> = Arc::new(f);
        self.update(path, |rule| rule.transformer(transform))
    }

    /// Attach a validate closure to an already declared path
    pub fn validate<F>(self, path: &str, f: F) -> Self
    where
        F: Fn(&Value, &ValidationContext<'_>) -> Option<Vec<FieldError>> + Send + Sync + 'static,
    {
        let validate: Arc<dyn Validate> = Arc::new(f);
        self.update(path, |rule| rule.validator(validate))
    }

    fn update(mut self, path: &str, f: impl FnOnce(FieldRule) -> FieldRule) -> Self {
        match self.rules.get_mut(path) {
            Some(rule) => *rule = f(std::mem::take(rule)),
            None => self.errors.push(SchemaError::UnknownPath {
                path: path.to_string(),
            }),
        }
        self
    }

    /// Finish building, failing on the first recorded error
    pub fn build(mut self) -> Result<SchemaIndex, SchemaError> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        check_parents(&self.rules)?;
        let entries: IndexMap<String, SchemaEntry> = self
            .rules
            .into_iter()
            .map(|(path, rule)| {
                let entry = SchemaEntry {
                    path: FieldPath::normalize(&path),
                    rule: Arc::new(rule),
                };
                (path, entry)
            })
            .collect();
        tracing::debug!(target: "mongorules::schema", rules = entries.len(), "Schema built");
        Ok(SchemaIndex {
            entries,
            seen: Mutex::new(FxHashMap::default()),
        })
    }
}

// A rule with children is either an object or an array of them; any other
// type leaves its children unreachable.
fn check_parents(rules: &IndexMap<String, FieldRule>) -> Result<(), SchemaError> {
    let paths: Vec<FieldPath> = rules.keys().map(|p| FieldPath::normalize(p)).collect();
    for ((path, rule), parsed) in rules.iter().zip(&paths) {
        let is_parent = paths.iter().any(|other| parsed.is_strict_ancestor_of(other));
        if is_parent && !(rule.field_type == FieldType::Object || rule.field_type.is_array()) {
            return Err(SchemaError::InvalidRule {
                path: path.clone(),
                message: "a rule with children must be typed object or array".to_string(),
            });
        }
    }
    Ok(())
}
