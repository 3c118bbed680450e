//! Subdocument preprocessors
//!
//! A subdocument preprocessor owns the payload units for one payload: a whole
//! document, the payload of one update operator, an array element, or an
//! object assigned by `$set`. The unit layout is built once and reused across
//! passes.
//!
//! # Layouts
//!
//! - Document: one unit per schema rule beneath the root, in declaration
//!   order. Rules beneath an array of objects belong to that array's element
//!   template, not to the document.
//! - Operator: one unit per payload key that has a rule. Keys are live paths
//!   (`account.friends.0.name`).
//! - Filter: no units; filters are only checked for unknown fields.

use mongorules_core::{get_at, set_at, FieldError, FieldPath, Operator, UpdateClass};
use mongorules_schema::SchemaIndex;
use serde_json::Value;
use std::sync::Arc;

use crate::unit::{Locator, Nested, PassContext, PayloadUnit, UnitMode};

/// Shape of the payload a subdocument preprocessor reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Document,
    Filter,
    Operator(Operator),
}

pub struct SubdocumentPreprocessor {
    schema: Arc<SchemaIndex>,
    root: FieldPath,
    layout: Layout,
    units: Vec<PayloadUnit>,
}

impl SubdocumentPreprocessor {
    /// Units for every rule beneath `root`
    pub fn document(schema: Arc<SchemaIndex>, root: FieldPath) -> Self {
        let mut units = Vec::new();
        for entry in schema.subschema_at(&root.to_path_string(), None) {
            let path = entry.path();
            if beneath_array(&schema, &root, path) {
                continue;
            }
            let rule = Arc::clone(entry.rule());
            let relative = path.relative_to(&root).unwrap_or_default();
            let mut unit =
                PayloadUnit::new(path.clone(), Locator::Nested(relative), Arc::clone(&rule), UnitMode::Field);
            if schema.has_descendants(path) {
                unit = if rule.field_type.is_array() {
                    let template = Self::document(Arc::clone(&schema), path.clone());
                    unit.with_nested(Nested::Elements(Box::new(template)))
                } else {
                    unit.into_container()
                };
            }
            units.push(unit);
        }
        SubdocumentPreprocessor {
            schema,
            root,
            layout: Layout::Document,
            units,
        }
    }

    pub fn filter(schema: Arc<SchemaIndex>) -> Self {
        SubdocumentPreprocessor {
            schema,
            root: FieldPath::root(),
            layout: Layout::Filter,
            units: Vec::new(),
        }
    }

    /// Units for the keys of one update operator's payload
    ///
    /// Keys without a rule get no unit; pass-through operators get none at
    /// all.
    pub fn operator(schema: Arc<SchemaIndex>, op: Operator, keys: &[String]) -> Self {
        let mut units = Vec::new();
        if let Some(class) = op.update_class() {
            for key in keys {
                let path = FieldPath::normalize(key);
                let Some(rule) = schema.descriptor_at(&path.to_path_string()).cloned() else {
                    continue;
                };
                let mode = match class {
                    UpdateClass::Assign if targets_element(key) => UnitMode::Element,
                    UpdateClass::Assign => UnitMode::Field,
                    UpdateClass::Append => UnitMode::Element,
                    UpdateClass::Arithmetic => UnitMode::Arithmetic,
                    UpdateClass::PassThrough => continue,
                };
                let mut unit =
                    PayloadUnit::new(path.clone(), Locator::Key(key.clone()), Arc::clone(&rule), mode);
                if mode != UnitMode::Arithmetic && schema.has_descendants(&path) {
                    let template = Box::new(Self::document(Arc::clone(&schema), path.clone()));
                    unit = unit.with_nested(if rule.field_type.is_array() || mode == UnitMode::Element {
                        Nested::Elements(template)
                    } else {
                        Nested::Object(template)
                    });
                }
                units.push(unit);
            }
        }
        SubdocumentPreprocessor {
            schema,
            root: FieldPath::root(),
            layout: Layout::Operator(op),
            units,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn root(&self) -> &FieldPath {
        &self.root
    }

    pub fn units(&self) -> &[PayloadUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Load every unit from the live payload
    pub fn hydrate(&mut self, live: &Value) {
        for unit in &mut self.units {
            let value = match unit.locator() {
                Locator::Nested(relative) => get_at(live, relative).cloned(),
                Locator::Key(key) => live.get(key.as_str()).cloned(),
            };
            unit.set_value(value);
        }
    }

    /// Evaluate every unit, concatenating errors in unit order
    ///
    /// Errors are located relative to the payload root. Every unit runs even
    /// after an earlier one failed. A top-level pass (`root_key` empty) resets
    /// the schema for `cache_key` once and releases it when done; a nested
    /// pass shares its parent's state.
    pub fn preprocess(&mut self, cache_key: &str, root_key: &str) -> Option<Vec<FieldError>> {
        let schema = Arc::clone(&self.schema);
        let top_level = root_key.is_empty();
        if top_level {
            schema.reset(cache_key);
        }
        let ctx = PassContext {
            schema: &schema,
            cache_key,
            pass_key: cache_key,
            location: "",
            scope: "",
        };
        let errors = self.preprocess_in(&ctx);
        if top_level {
            schema.release(cache_key);
        }
        errors
    }

    pub(crate) fn preprocess_in(&mut self, ctx: &PassContext<'_>) -> Option<Vec<FieldError>> {
        let mut errors = Vec::new();
        for unit in &mut self.units {
            if let Some(unit_errors) = unit.transform_and_validate(ctx) {
                errors.extend(unit_errors);
            }
        }
        if errors.is_empty() {
            None
        } else {
            Some(errors)
        }
    }

    /// Write unit values back into the live payload
    ///
    /// Missing intermediate objects are created; containers and units with
    /// no value are skipped.
    pub fn update_live_value(&self, mut live: Value) -> Value {
        for unit in &self.units {
            if unit.is_container() {
                continue;
            }
            let Some(value) = unit.value() else {
                continue;
            };
            match unit.locator() {
                Locator::Nested(relative) => {
                    set_at(&mut live, relative, value.clone());
                }
                Locator::Key(key) => {
                    if let Some(map) = live.as_object_mut() {
                        map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        live
    }

    pub fn reset_payload(&mut self) {
        for unit in &mut self.units {
            unit.reset();
        }
    }
}

impl std::fmt::Debug for SubdocumentPreprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubdocumentPreprocessor")
            .field("root", &self.root)
            .field("layout", &self.layout)
            .field("units", &self.units)
            .finish()
    }
}

// True when an array rule lies strictly between `root` and `path`.
fn beneath_array(schema: &SchemaIndex, root: &FieldPath, path: &FieldPath) -> bool {
    path.ancestors()
        .filter(|ancestor| root.is_strict_ancestor_of(ancestor))
        .any(|ancestor| {
            schema
                .descriptor_at(&ancestor.to_path_string())
                .map_or(false, |rule| rule.field_type.is_array())
        })
}

// `friends.0`, `friends.$` and `friends.$[elem]` address a single element.
fn targets_element(key: &str) -> bool {
    key.rsplit('.').next().map_or(false, |last| {
        (!last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()))
            || last == "$"
            || last.starts_with("$[")
    })
}
