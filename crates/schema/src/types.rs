//! Field type constraints

use chrono::{DateTime, NaiveDate};
use mongorules_core::is_object_id;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::SchemaError;

/// Declared type of a field
///
/// In a JSON schema a type is written as a name (`"string"`) or as a
/// one-element list for arrays (`["string"]`, `[["number"]]`). An empty list
/// is an array of anything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldType {
    #[default]
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Object,
    ObjectId,
    /// RFC 3339 timestamp, `YYYY-MM-DD` date, or `{"$date": ...}`
    Date,
    Array(Box<FieldType>),
}

impl FieldType {
    /// Array of the given element type
    pub fn array_of(element: FieldType) -> Self {
        FieldType::Array(Box::new(element))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array(_))
    }

    /// Element type if this is an array type
    pub fn element(&self) -> Option<&FieldType> {
        match self {
            FieldType::Array(inner) => Some(inner),
            _ => None,
        }
    }

    /// Check a present value against this type
    ///
    /// Array types check every element.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::Any => true,
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => match value {
                Value::Number(n) => {
                    n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
                }
                _ => false,
            },
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::ObjectId => is_object_id(value) || is_object_id_hex(value),
            FieldType::Date => is_date(value),
            FieldType::Array(inner) => value
                .as_array()
                .map_or(false, |items| items.iter().all(|item| inner.matches(item))),
        }
    }

    /// Whether numeric update operands (`$inc`, `$mul`) are acceptable
    pub fn accepts_numbers(&self) -> bool {
        matches!(
            self,
            FieldType::Any | FieldType::Number | FieldType::Integer
        )
    }

    /// Parse the JSON form used in flattened schemas
    pub fn from_json(path: &str, value: &Value) -> Result<Self, SchemaError> {
        match value {
            Value::String(name) => name.parse().map_err(|_| SchemaError::InvalidType {
                path: path.to_string(),
                found: value.to_string(),
            }),
            Value::Array(items) => match items.as_slice() {
                [] => Ok(FieldType::array_of(FieldType::Any)),
                [inner] => Ok(FieldType::array_of(FieldType::from_json(path, inner)?)),
                _ => Err(SchemaError::InvalidType {
                    path: path.to_string(),
                    found: value.to_string(),
                }),
            },
            _ => Err(SchemaError::InvalidType {
                path: path.to_string(),
                found: value.to_string(),
            }),
        }
    }
}

impl FromStr for FieldType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" | "*" => Ok(FieldType::Any),
            "string" => Ok(FieldType::String),
            "number" => Ok(FieldType::Number),
            "integer" => Ok(FieldType::Integer),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "object" => Ok(FieldType::Object),
            "objectid" | "objectId" => Ok(FieldType::ObjectId),
            "date" => Ok(FieldType::Date),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Any => f.write_str("any"),
            FieldType::String => f.write_str("string"),
            FieldType::Number => f.write_str("number"),
            FieldType::Integer => f.write_str("integer"),
            FieldType::Boolean => f.write_str("boolean"),
            FieldType::Object => f.write_str("object"),
            FieldType::ObjectId => f.write_str("objectid"),
            FieldType::Date => f.write_str("date"),
            FieldType::Array(inner) => write!(f, "[{}]", inner),
        }
    }
}

fn is_object_id_hex(value: &Value) -> bool {
    value
        .as_str()
        .map_or(false, |s| s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn is_date(value: &Value) -> bool {
    match value {
        Value::String(s) => is_date_str(s),
        Value::Object(map) if map.len() == 1 => match map.get("$date") {
            Some(Value::String(s)) => is_date_str(s),
            Some(Value::Number(_)) => true,
            Some(Value::Object(inner)) => inner.contains_key("$numberLong"),
            _ => false,
        },
        _ => false,
    }
}

fn is_date_str(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}
