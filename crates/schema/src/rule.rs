//! Field rule descriptors
//!
//! A [`FieldRule`] is the schema metadata for one canonical path: declarative
//! constraints plus optional transform/validate callables. Rules are immutable
//! once the schema is built and are shared behind `Arc`.

use mongorules_core::FieldError;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::types::FieldType;

/// Context handed to custom validators
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Cache key of the pass, usable for run-scoped memoization
    pub cache_key: &'a str,
    /// Live location of the value (indices included)
    pub path: &'a str,
}

/// Value transform applied before custom validation
pub trait Transform: Send + Sync {
    /// Produce the transformed value
    fn transform(&self, value: Value) -> Value;
}

impl<F> Transform for F
where
    F: Fn(Value) -> Value + Send + Sync,
{
    fn transform(&self, value: Value) -> Value {
        self(value)
    }
}

/// Custom validator run after built-in checks and the transform
pub trait Validate: Send + Sync {
    /// Return the violations found, or `None` if the value is valid
    fn validate(&self, value: &Value, ctx: &ValidationContext<'_>) -> Option<Vec<FieldError>>;
}

impl<F> Validate for F
where
    F: Fn(&Value, &ValidationContext<'_>) -> Option<Vec<FieldError>> + Send + Sync,
{
    fn validate(&self, value: &Value, ctx: &ValidationContext<'_>) -> Option<Vec<FieldError>> {
        self(value, ctx)
    }
}

/// Schema metadata for one canonical path
#[derive(Clone, Default)]
pub struct FieldRule {
    pub field_type: FieldType,
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub default: Option<Value>,
    pub sanitize: bool,
    pub unique: bool,
    transform: Option<Arc<dyn Transform>>,
    validate: Option<Arc<dyn Validate>>,
}

impl FieldRule {
    /// A rule accepting any value
    pub fn new() -> Self {
        Self::default()
    }

    /// A rule with the given type
    pub fn typed(field_type: FieldType) -> Self {
        FieldRule {
            field_type,
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn sanitize(mut self) -> Self {
        self.sanitize = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Attach a transform closure
    pub fn transform_with<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }

    /// Attach a shared transform implementation
    pub fn transformer(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Attach a validate closure
    pub fn validate_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &ValidationContext<'_>) -> Option<Vec<FieldError>> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Attach a shared validator implementation
    pub fn validator(mut self, validate: Arc<dyn Validate>) -> Self {
        self.validate = Some(validate);
        self
    }

    /// Run the transform callable, or return the value unchanged
    pub fn apply_transform(&self, value: Value) -> Value {
        match &self.transform {
            Some(t) => t.transform(value),
            None => value,
        }
    }

    /// Run the validate callable, if any
    pub fn apply_validate(
        &self,
        value: &Value,
        ctx: &ValidationContext<'_>,
    ) -> Option<Vec<FieldError>> {
        self.validate
            .as_ref()
            .and_then(|v| v.validate(value, ctx))
            .filter(|errors| !errors.is_empty())
    }

    pub fn has_transform(&self) -> bool {
        self.transform.is_some()
    }

    pub fn has_validator(&self) -> bool {
        self.validate.is_some()
    }

    /// Check the declarative constraints of a present value
    ///
    /// `required` is not checked here: the caller decides what counts as
    /// present. Stops at the first failing constraint.
    pub fn check_constraints(&self, value: &Value, path: &str) -> Option<FieldError> {
        if !self.field_type.matches(value) {
            return Some(FieldError::type_mismatch(path, &self.field_type));
        }
        let len = match value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            _ => None,
        }?;
        if let Some(min) = self.min_length {
            if len < min {
                return Some(FieldError::min_length(path, min, len));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Some(FieldError::max_length(path, max, len));
            }
        }
        None
    }
}

impl fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("default", &self.default)
            .field("sanitize", &self.sanitize)
            .field("unique", &self.unique)
            .field("transform", &self.transform.is_some())
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

// =============================================================================
// Sanitize
// =============================================================================

/// Escape HTML-significant characters in strings (recursing into arrays)
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(escape_html(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        other => other,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

// =============================================================================
// JSON rule declarations
// =============================================================================

/// Declarative form of a rule inside a flattened JSON schema
///
/// ```json
/// { "account.friends.name": { "type": "string", "required": true, "minLength": 1 } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldSpec {
    #[serde(rename = "type", default)]
    pub field_type: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub sanitize: bool,
    #[serde(default)]
    pub unique: bool,
    /// Name of a built-in transform (`lowercase`, `uppercase`, `trim`)
    #[serde(default)]
    pub transform: Option<String>,
}

impl FieldSpec {
    /// Compile into a rule for `path`
    pub fn into_rule(self, path: &str) -> Result<FieldRule, SchemaError> {
        let field_type = match &self.field_type {
            Some(ty) => FieldType::from_json(path, ty)?,
            None => FieldType::Any,
        };
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(SchemaError::InvalidRule {
                    path: path.to_string(),
                    message: format!("minLength {} exceeds maxLength {}", min, max),
                });
            }
        }
        let mut rule = FieldRule {
            field_type,
            required: self.required,
            min_length: self.min_length,
            max_length: self.max_length,
            default: self.default,
            sanitize: self.sanitize,
            unique: self.unique,
            transform: None,
            validate: None,
        };
        if let Some(name) = self.transform {
            let transform = builtin_transform(&name).ok_or_else(|| SchemaError::UnknownTransform {
                path: path.to_string(),
                name: name.clone(),
            })?;
            rule.transform = Some(transform);
        }
        Ok(rule)
    }
}

/// Look up a built-in string transform by name
pub fn builtin_transform(name: &str) -> Option<Arc<dyn Transform>> {
    fn map_str(value: Value, f: impl Fn(&str) -> String) -> Value {
        match value {
            Value::String(s) => Value::String(f(&s)),
            other => other,
        }
    }
    let transform: Arc<dyn Transform> = match name {
        "lowercase" => Arc::new(|v: Value| map_str(v, str::to_lowercase)),
        "uppercase" => Arc::new(|v: Value| map_str(v, str::to_uppercase)),
        "trim" => Arc::new(|v: Value| map_str(v, |s| s.trim().to_string())),
        _ => return None,
    };
    Some(transform)
}
