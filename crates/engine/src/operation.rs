//! Operations and their argument slots
//!
//! Each operation reads a fixed set of positional arguments. Parsing splits
//! them into slots, one per payload a preprocessor validates:
//! - Insert: `args[0]` is a document or an array of documents
//! - Update: `args[0]` filter, `args[1]` replacement document or operator
//!   payload (one slot per operator), `args[2]` options (untouched)
//! - Find, FindOne, Count, Remove: `args[0]` filter

use mongorules_core::{is_operator_key, unique_paths, FieldError, Operator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A collection operation whose arguments can be preprocessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Insert,
    Update,
    Find,
    FindOne,
    Count,
    Remove,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Insert,
        Operation::Update,
        Operation::Find,
        Operation::FindOne,
        Operation::Count,
        Operation::Remove,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Find => "find",
            Operation::FindOne => "findOne",
            Operation::Count => "count",
            Operation::Remove => "remove",
        }
    }

    /// Whether an update's options (`args[2]`) request an upsert
    pub fn is_upsert(self, args: &[Value]) -> bool {
        self == Operation::Update
            && args
                .get(2)
                .and_then(|options| options.get("upsert"))
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation '{}'", s))
    }
}

/// What a slot's payload is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// A whole document (insert, replacement update)
    Document,
    /// A query filter
    Filter,
    /// The payload of one top-level update operator
    Operator(Operator),
}

/// Where one payload lives inside the argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub kind: SlotKind,
    /// Positional argument index
    pub arg: usize,
    /// Element index for inserts of many documents
    pub index: Option<usize>,
    /// Operator payload keys in encounter order (empty for other kinds)
    pub keys: Vec<String>,
}

impl Slot {
    fn document(arg: usize, index: Option<usize>) -> Self {
        Slot {
            kind: SlotKind::Document,
            arg,
            index,
            keys: Vec::new(),
        }
    }

    fn filter(arg: usize) -> Self {
        Slot {
            kind: SlotKind::Filter,
            arg,
            index: None,
            keys: Vec::new(),
        }
    }

    fn operator(arg: usize, op: Operator, keys: Vec<String>) -> Self {
        Slot {
            kind: SlotKind::Operator(op),
            arg,
            index: None,
            keys,
        }
    }

    /// Live location prefix for errors raised inside this slot
    pub fn location(&self) -> String {
        self.index.map(|i| i.to_string()).unwrap_or_default()
    }

    pub fn value<'a>(&self, args: &'a [Value]) -> Option<&'a Value> {
        let arg = args.get(self.arg)?;
        let arg = match self.index {
            Some(i) => arg.get(i)?,
            None => arg,
        };
        match self.kind {
            SlotKind::Operator(op) => arg.get(op.to_string().as_str()),
            _ => Some(arg),
        }
    }

    pub fn value_mut<'a>(&self, args: &'a mut [Value]) -> Option<&'a mut Value> {
        let arg = args.get_mut(self.arg)?;
        let arg = match self.index {
            Some(i) => arg.get_mut(i)?,
            None => arg,
        };
        match self.kind {
            SlotKind::Operator(op) => arg.get_mut(op.to_string().as_str()),
            _ => Some(arg),
        }
    }

    fn signature(&self) -> String {
        match self.kind {
            SlotKind::Document => "doc".to_string(),
            SlotKind::Filter => "filter".to_string(),
            SlotKind::Operator(op) => format!("{}({})", op, self.keys.join(",")),
        }
    }
}

/// Split an argument list into payload slots
///
/// Malformed arguments are reported as field errors rather than slots.
pub fn parse_slots(operation: Operation, args: &[Value]) -> Result<Vec<Slot>, Vec<FieldError>> {
    let mut slots = Vec::new();
    let mut errors = Vec::new();
    match operation {
        Operation::Insert => match args.first() {
            Some(Value::Object(_)) => slots.push(Slot::document(0, None)),
            Some(Value::Array(docs)) => {
                for (i, doc) in docs.iter().enumerate() {
                    if doc.is_object() {
                        slots.push(Slot::document(0, Some(i)));
                    } else {
                        errors.push(
                            FieldError::type_mismatch(i.to_string(), "object")
                                .with_message("inserted documents must be objects"),
                        );
                    }
                }
            }
            Some(_) => errors.push(
                FieldError::type_mismatch("", "object")
                    .with_message("insert expects a document or an array of documents"),
            ),
            None => errors.push(
                FieldError::required("").with_message("insert expects a document argument"),
            ),
        },
        Operation::Update => {
            filter_slot(args, &mut slots, &mut errors);
            match args.get(1) {
                Some(Value::Object(update)) => update_slots(update, &mut slots, &mut errors),
                Some(_) => errors.push(
                    FieldError::type_mismatch("", "object")
                        .with_message("update expects a document or operator payload"),
                ),
                None => errors.push(
                    FieldError::required("").with_message("update expects an update argument"),
                ),
            }
        }
        Operation::Find | Operation::FindOne | Operation::Count | Operation::Remove => {
            filter_slot(args, &mut slots, &mut errors)
        }
    }
    if errors.is_empty() {
        Ok(slots)
    } else {
        Err(errors)
    }
}

fn filter_slot(args: &[Value], slots: &mut Vec<Slot>, errors: &mut Vec<FieldError>) {
    match args.first() {
        Some(Value::Object(_)) => slots.push(Slot::filter(0)),
        None | Some(Value::Null) => {}
        Some(_) => errors.push(
            FieldError::type_mismatch("", "object").with_message("filter must be an object"),
        ),
    }
}

fn update_slots(
    update: &serde_json::Map<String, Value>,
    slots: &mut Vec<Slot>,
    errors: &mut Vec<FieldError>,
) {
    let operators = update.keys().filter(|key| is_operator_key(key)).count();
    if operators == 0 {
        slots.push(Slot::document(1, None));
        return;
    }
    for (key, payload) in update {
        if !is_operator_key(key) {
            errors.push(
                FieldError::type_mismatch(key.as_str(), "operator")
                    .with_message("update operators and plain fields cannot be mixed"),
            );
            continue;
        }
        let op = match Operator::lookup(key) {
            Some(op) if op.update_class().is_some() => op,
            _ => {
                errors.push(
                    FieldError::unknown(key.as_str()).with_message("unsupported update operator"),
                );
                continue;
            }
        };
        match payload {
            Value::Object(fields) => slots.push(Slot::operator(1, op, fields.keys().cloned().collect())),
            _ => errors.push(
                FieldError::type_mismatch(key.as_str(), "object")
                    .with_message("operator payload must be an object"),
            ),
        }
    }
}

/// Derive a cache key from the operation, collection and argument shape
///
/// Calls whose arguments have the same slots and the same flattened paths
/// share a key.
pub fn cache_key_for(operation: Operation, collection: &str, args: &[Value]) -> String {
    let slots = match parse_slots(operation, args) {
        Ok(slots) => slots,
        Err(_) => return format!("{}:{}:invalid", operation, collection),
    };
    let shape: Vec<String> = slots.iter().map(Slot::signature).collect();
    let mut paths = Vec::new();
    for arg in args.iter().take(2) {
        for path in unique_paths(arg) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    format!(
        "{}:{}:{}:{}",
        operation,
        collection,
        shape.join(";"),
        paths.join(",")
    )
}
