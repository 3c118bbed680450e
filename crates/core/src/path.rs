//! Canonical field paths
//!
//! This module defines the path space shared by schemas and live payloads:
//! - FieldPath: dot-separated field names with no indices or operators
//! - normalize_path / strip_update_markers: live key → canonical path
//! - flatten_document / unique_paths: live payload → canonical paths
//! - get_at / set_at: read and write a live value at a canonical path
//!
//! # Normalization Rules
//!
//! | Live segment | Example | Result |
//! |--------------|---------|--------|
//! | field name | `account.name` | kept |
//! | array index | `friends.0.name` | dropped |
//! | positional marker | `friends.$.name` | dropped |
//! | operator | `$set.name`, `a.$elemMatch` | dropped |
//! | empty | `a..b` | dropped |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::operator::is_operator_key;

/// Separator between path segments
pub const PATH_SEP: char = '.';

/// A canonical path into a document
///
/// Holds only field names: array indices, positional markers and operator
/// segments are stripped on construction, so two live keys that address the
/// same schema field produce equal paths.
///
/// # Examples
///
/// ```
/// use mongorules_core::path::FieldPath;
///
/// let path = FieldPath::normalize("$set.account.friends.$.name");
/// assert_eq!(path.to_path_string(), "account.friends.name");
///
/// let account = FieldPath::root().key("account");
/// assert!(account.is_ancestor_of(&path));
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// The document root (no segments)
    pub fn root() -> Self {
        FieldPath {
            segments: Vec::new(),
        }
    }

    /// Build a canonical path from a live key
    pub fn normalize(live_key: &str) -> Self {
        FieldPath {
            segments: live_key
                .split(PATH_SEP)
                .filter(|seg| is_field_segment(seg))
                .map(str::to_string)
                .collect(),
        }
    }

    /// Create a path from already-canonical segments
    pub fn from_segments(segments: Vec<String>) -> Self {
        FieldPath { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a field segment (builder pattern)
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(key.into());
        self
    }

    /// Check if this path is an ancestor of another (or equal)
    ///
    /// Comparison is per segment, so `account.friend` is not an ancestor of
    /// `account.friends`.
    pub fn is_ancestor_of(&self, other: &FieldPath) -> bool {
        if self.segments.len() > other.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| a == b)
    }

    /// Ancestor check that excludes equality
    pub fn is_strict_ancestor_of(&self, other: &FieldPath) -> bool {
        self.segments.len() < other.segments.len() && self.is_ancestor_of(other)
    }

    /// The remainder of this path below `ancestor`
    pub fn relative_to(&self, ancestor: &FieldPath) -> Option<FieldPath> {
        if !ancestor.is_ancestor_of(self) {
            return None;
        }
        Some(FieldPath {
            segments: self.segments[ancestor.len()..].to_vec(),
        })
    }

    /// Strict ancestors, nearest first, excluding the root
    pub fn ancestors(&self) -> impl Iterator<Item = FieldPath> + '_ {
        (1..self.segments.len())
            .rev()
            .map(move |n| FieldPath::from_segments(self.segments[..n].to_vec()))
    }

    /// Convert to the dotted string form (`""` for the root)
    pub fn to_path_string(&self) -> String {
        self.segments.join(".")
    }
}

impl FromStr for FieldPath {
    type Err = Infallible;

    /// Parsing never fails: malformed keys normalize to a best-effort path
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FieldPath::normalize(s))
    }
}

impl From<&str> for FieldPath {
    fn from(s: &str) -> Self {
        FieldPath::normalize(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path_string())
    }
}

fn is_field_segment(seg: &str) -> bool {
    !seg.is_empty() && !is_index_segment(seg) && !is_operator_key(seg)
}

fn is_index_segment(seg: &str) -> bool {
    !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit())
}

// =============================================================================
// String-level normalization
// =============================================================================

/// Remove update semantics from a single live key
///
/// `account.friends.$.name`, `$set.account.friends.0.name` and
/// `account.friends.name` all become `account.friends.name`.
pub fn strip_update_markers(key: &str) -> String {
    FieldPath::normalize(key).to_path_string()
}

/// Normalize a live key into a canonical path string
///
/// Idempotent: normalizing a canonical path returns it unchanged.
pub fn normalize_path(live_key: &str) -> String {
    strip_update_markers(live_key)
}

/// Join a live parent location and a child key with the path separator
pub fn join_live(parent: &str, key: &str) -> String {
    match (parent.is_empty(), key.is_empty()) {
        (true, _) => key.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{}{}{}", parent, PATH_SEP, key),
    }
}

// =============================================================================
// Payload flattening
// =============================================================================

/// Flatten a live payload into canonical paths
///
/// Object fields recurse with the field name as prefix. Array fields emit their
/// own path and then recurse into every element that is an object; scalar
/// elements are covered by the array's path. Scalars emit their path directly.
///
/// Duplicates are kept (one entry per visited occurrence); use
/// [`unique_paths`] for the set form. Keys made only of operators or indices
/// normalize to nothing and are dropped.
pub fn flatten_document(value: &Value) -> Vec<String> {
    let mut raw = Vec::new();
    if let Value::Object(map) = value {
        collect_paths(map, "", &mut raw);
    }
    raw.iter()
        .map(|p| normalize_path(p))
        .filter(|p| !p.is_empty())
        .collect()
}

fn collect_paths(map: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in map {
        let full = join_live(prefix, key);
        match value {
            Value::Object(child) => collect_paths(child, &full, out),
            Value::Array(items) => {
                out.push(full.clone());
                for item in items {
                    if let Value::Object(element) = item {
                        collect_paths(element, &full, out);
                    }
                }
            }
            _ => out.push(full),
        }
    }
}

/// Flattened canonical paths with duplicates removed (first occurrence wins)
pub fn unique_paths(value: &Value) -> Vec<String> {
    let mut seen = rustc_hash::FxHashSet::default();
    flatten_document(value)
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

// =============================================================================
// Live value access
// =============================================================================

/// Read a live value at a canonical path
///
/// Missing intermediate segments, or intermediates that are not objects,
/// yield `None`. The root path returns the value itself.
pub fn get_at<'a>(value: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut current = value;
    for seg in path.segments() {
        current = current.as_object()?.get(seg)?;
    }
    Some(current)
}

/// Write a live value at a canonical path
///
/// Missing intermediate objects are created. Returns `false` without writing
/// when an existing intermediate is not an object, or when `path` is the root
/// and `value` would be replaced wholesale by a non-object.
pub fn set_at(value: &mut Value, path: &FieldPath, new_value: Value) -> bool {
    let Some((last, parents)) = path.segments().split_last() else {
        *value = new_value;
        return true;
    };
    let mut current = value;
    for seg in parents {
        let Some(map) = current.as_object_mut() else {
            return false;
        };
        current = map
            .entry(seg.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    match current.as_object_mut() {
        Some(map) => {
            map.insert(last.clone(), new_value);
            true
        }
        None => false,
    }
}
