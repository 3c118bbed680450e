//! Payload units
//!
//! A unit binds one schema rule to one location in a live payload. Units are
//! built once per cached layout and reused: each pass hydrates a value into
//! the unit, evaluates it, and the owning subdocument writes it back and
//! resets it.
//!
//! Evaluation order for a present value:
//! 1. `required` (absent or null)
//! 2. `type`, then `minLength`/`maxLength`
//! 3. `unique` within the enclosing array
//! 4. nested element or subdocument passes
//! 5. sanitize, transform, custom validate
//!
//! A failure at steps 1-4 skips step 5.

use mongorules_core::{join_live, ErrorSet, FieldError, FieldPath};
use mongorules_schema::{sanitize_value, FieldRule, FieldType, SchemaIndex, ValidationContext};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::modifiers::{extract_modifiers, reattach_modifiers, Modifier, EACH_KEY};
use crate::subdocument::SubdocumentPreprocessor;

/// Per-pass state shared by every unit in a pass
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    pub schema: &'a SchemaIndex,
    pub cache_key: &'a str,
    /// Key of the top-level pass, scoping the uniqueness memo
    pub pass_key: &'a str,
    /// Live location of the payload being evaluated
    pub location: &'a str,
    /// Live location of the enclosing array, scoping `unique`
    pub scope: &'a str,
}

/// How a unit finds its value in the live payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Path relative to the subdocument root
    Nested(FieldPath),
    /// Literal key of a flat operator payload (`"account.friends.0.name"`)
    Key(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Nested(path) => write!(f, "{}", path),
            Locator::Key(key) => f.write_str(key),
        }
    }
}

/// How the hydrated value relates to the rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitMode {
    /// The value is the field itself
    Field,
    /// The value is one element, or `{$each: [...]}`, of an array field
    Element,
    /// The value is a numeric operand (`$inc`, `$mul`)
    Arithmetic,
}

/// Preprocessor reused for values beneath a unit
pub(crate) enum Nested {
    /// Applied to every object element of an array
    Elements(Box<SubdocumentPreprocessor>),
    /// Applied once to an object value
    Object(Box<SubdocumentPreprocessor>),
}

pub struct PayloadUnit {
    path: FieldPath,
    locator: Locator,
    rule: Arc<FieldRule>,
    mode: UnitMode,
    container: bool,
    nested: Option<Nested>,
    value: Option<Value>,
    modifiers: Option<Vec<Modifier>>,
    last_errors: Vec<FieldError>,
}

impl PayloadUnit {
    pub fn new(path: FieldPath, locator: Locator, rule: Arc<FieldRule>, mode: UnitMode) -> Self {
        PayloadUnit {
            path,
            locator,
            rule,
            mode,
            container: false,
            nested: None,
            value: None,
            modifiers: None,
            last_errors: Vec::new(),
        }
    }

    /// Mark as an object whose fields have their own units
    ///
    /// Containers are checked but never written back.
    pub(crate) fn into_container(mut self) -> Self {
        self.container = true;
        self
    }

    pub(crate) fn with_nested(mut self, nested: Nested) -> Self {
        self.nested = Some(nested);
        self
    }

    /// Canonical path of the rule
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn rule(&self) -> &FieldRule {
        &self.rule
    }

    pub fn mode(&self) -> UnitMode {
        self.mode
    }

    pub fn is_container(&self) -> bool {
        self.container
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Modifiers detached from an `$each` payload in the last evaluation
    pub fn modifiers(&self) -> Option<&[Modifier]> {
        self.modifiers.as_deref()
    }

    pub fn last_errors(&self) -> &[FieldError] {
        &self.last_errors
    }

    /// Hydrate the unit; an absent value takes the rule's default
    pub fn set_value(&mut self, value: Option<Value>) {
        self.value = value.or_else(|| self.rule.default.clone());
        self.last_errors.clear();
    }

    /// Evaluate the hydrated value, possibly replacing it
    pub fn transform_and_validate(&mut self, ctx: &PassContext<'_>) -> Option<Vec<FieldError>> {
        let location = join_live(ctx.location, &self.locator.to_string());
        let mut errors = ErrorSet::ok();
        let value = self.value.take();
        self.value = match self.mode {
            UnitMode::Field => self.evaluate_field(value, &location, ctx, &mut errors),
            UnitMode::Element => self.evaluate_elements(value, &location, ctx, &mut errors),
            UnitMode::Arithmetic => self.evaluate_arithmetic(value, &location, &mut errors),
        };
        self.last_errors = errors.as_slice().to_vec();
        errors.into_option()
    }

    /// Clear value, modifiers and errors; structure is kept
    pub fn reset(&mut self) {
        self.value = None;
        self.modifiers = None;
        self.last_errors.clear();
        match &mut self.nested {
            Some(Nested::Elements(sub)) | Some(Nested::Object(sub)) => sub.reset_payload(),
            None => {}
        }
    }

    fn evaluate_field(
        &mut self,
        value: Option<Value>,
        location: &str,
        ctx: &PassContext<'_>,
        errors: &mut ErrorSet,
    ) -> Option<Value> {
        let mut value = match value {
            Some(value) if !value.is_null() => value,
            missing => {
                if self.rule.required {
                    errors.push(FieldError::required(location));
                }
                return missing;
            }
        };

        if let Some(error) = self.rule.check_constraints(&value, location) {
            errors.push(error);
            return Some(value);
        }
        if self.rule.unique {
            let scope = format!("{}#{}", ctx.scope, self.path);
            if !ctx.schema.record_unique(ctx.pass_key, &scope, &value) {
                errors.push(FieldError::unique(location));
                return Some(value);
            }
        }

        let before = errors.len();
        value = match (&mut self.nested, value) {
            (Some(Nested::Elements(template)), Value::Array(items)) => Value::Array(run_elements(
                template, items, location, None, ctx, errors,
            )),
            (Some(Nested::Object(sub)), value) => {
                run_object(sub, value, location, ctx, errors)
            }
            (_, value) => value,
        };
        if errors.len() > before {
            return Some(value);
        }

        if !self.container {
            if self.rule.sanitize {
                value = sanitize_value(value);
            }
            value = self.rule.apply_transform(value);
        }
        let vctx = ValidationContext {
            cache_key: ctx.cache_key,
            path: location,
        };
        if let Some(custom) = self.rule.apply_validate(&value, &vctx) {
            errors.merge(custom);
        }
        Some(value)
    }

    fn evaluate_elements(
        &mut self,
        value: Option<Value>,
        location: &str,
        ctx: &PassContext<'_>,
        errors: &mut ErrorSet,
    ) -> Option<Value> {
        let value = value?;
        let element_type = match &self.rule.field_type {
            FieldType::Array(inner) => inner.as_ref().clone(),
            FieldType::Any => FieldType::Any,
            other => {
                errors.push(
                    FieldError::type_mismatch(location, "array")
                        .with_message(format!("cannot add elements to a field of type {}", other)),
                );
                return Some(value);
            }
        };

        let (items, rest, each_location) = match value {
            Value::Object(mut map) if map.contains_key(EACH_KEY) => {
                self.modifiers = extract_modifiers(&mut map);
                let each_location = join_live(location, EACH_KEY);
                match map.get_mut(EACH_KEY).map(Value::take) {
                    Some(Value::Array(items)) => (items, Some(map), each_location),
                    other => {
                        errors.push(FieldError::type_mismatch(&each_location, "array"));
                        let modifiers = self.modifiers.as_deref().unwrap_or_default();
                        let mut restored = reattach_modifiers(Vec::new(), map, modifiers);
                        if let Some(slot) = restored.get_mut(EACH_KEY) {
                            *slot = other.unwrap_or(Value::Null);
                        }
                        return Some(restored);
                    }
                }
            }
            single => (vec![single], None, location.to_string()),
        };

        let before = errors.len();
        let mut items = match &mut self.nested {
            Some(Nested::Elements(template)) | Some(Nested::Object(template)) => run_elements(
                template,
                items,
                &each_location,
                Some(&element_type),
                ctx,
                errors,
            ),
            None => check_elements(items, &each_location, &element_type, errors),
        };
        if errors.len() == before && self.rule.sanitize {
            items = items.into_iter().map(sanitize_value).collect();
        }

        Some(match rest {
            Some(rest) => {
                let modifiers = self.modifiers.as_deref().unwrap_or_default();
                reattach_modifiers(items, rest, modifiers)
            }
            None => items.into_iter().next().unwrap_or(Value::Null),
        })
    }

    fn evaluate_arithmetic(
        &mut self,
        value: Option<Value>,
        location: &str,
        errors: &mut ErrorSet,
    ) -> Option<Value> {
        let value = value?;
        if !value.is_number() {
            errors.push(
                FieldError::type_mismatch(location, "number")
                    .with_message("arithmetic operand must be a number"),
            );
        } else if !self.rule.field_type.accepts_numbers() {
            errors.push(
                FieldError::type_mismatch(location, &self.rule.field_type)
                    .with_message("field does not hold numbers"),
            );
        }
        Some(value)
    }
}

impl fmt::Debug for PayloadUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadUnit")
            .field("path", &self.path)
            .field("locator", &self.locator)
            .field("mode", &self.mode)
            .field("container", &self.container)
            .field("nested", &self.nested.is_some())
            .field("value", &self.value)
            .finish()
    }
}

// In a single-element append the element index is unknown, so the location
// is the key itself.
fn element_location(array_location: &str, index: usize, count: usize) -> String {
    if count == 1 && !array_location.ends_with(EACH_KEY) {
        array_location.to_string()
    } else {
        join_live(array_location, &index.to_string())
    }
}

fn check_elements(
    items: Vec<Value>,
    array_location: &str,
    element_type: &FieldType,
    errors: &mut ErrorSet,
) -> Vec<Value> {
    let count = items.len();
    for (i, item) in items.iter().enumerate() {
        if !element_type.matches(item) {
            errors.push(FieldError::type_mismatch(
                element_location(array_location, i, count),
                element_type,
            ));
        }
    }
    items
}

/// Run the element template over every object element
///
/// With `element_type`, elements are type-checked first (appends, where the
/// array-level type check has not run).
fn run_elements(
    template: &mut SubdocumentPreprocessor,
    items: Vec<Value>,
    array_location: &str,
    element_type: Option<&FieldType>,
    ctx: &PassContext<'_>,
    errors: &mut ErrorSet,
) -> Vec<Value> {
    let count = items.len();
    let mut out = Vec::with_capacity(count);
    for (i, item) in items.into_iter().enumerate() {
        let location = match element_type {
            Some(_) => element_location(array_location, i, count),
            None => join_live(array_location, &i.to_string()),
        };
        if let Some(ty) = element_type {
            if !ty.matches(&item) {
                errors.push(FieldError::type_mismatch(&location, ty));
                out.push(item);
                continue;
            }
        }
        if !item.is_object() {
            out.push(item);
            continue;
        }
        template.hydrate(&item);
        let element_ctx = PassContext {
            location: &location,
            scope: array_location,
            ..*ctx
        };
        if let Some(nested) = template.preprocess_in(&element_ctx) {
            errors.merge(nested);
        }
        out.push(template.update_live_value(item));
        template.reset_payload();
    }
    out
}

fn run_object(
    sub: &mut SubdocumentPreprocessor,
    value: Value,
    location: &str,
    ctx: &PassContext<'_>,
    errors: &mut ErrorSet,
) -> Value {
    if !value.is_object() {
        return value;
    }
    sub.hydrate(&value);
    let object_ctx = PassContext {
        location,
        ..*ctx
    };
    if let Some(nested) = sub.preprocess_in(&object_ctx) {
        errors.merge(nested);
    }
    let value = sub.update_live_value(value);
    sub.reset_payload();
    value
}
