//! Array-update modifier handling
//!
//! `$push` and `$addToSet` accept `{ "$each": [...], "$slice": n, "$sort": .. }`.
//! Only the `$each` items are validated; the other operators are detached
//! before validation and reattached afterwards.

use mongorules_core::{is_operator_key, Operator};
use serde_json::{Map, Value};

/// Key that carries the appended items
pub const EACH_KEY: &str = "$each";

/// A detached modifier and its operand
#[derive(Debug, Clone, PartialEq)]
pub struct Modifier {
    pub operator: String,
    pub value: Value,
}

impl Modifier {
    /// Resolved operator, `None` if the key is not an operator
    pub fn kind(&self) -> Option<Operator> {
        Operator::lookup(&self.operator)
    }
}

/// Detach every top-level `$`-key except `$each`
///
/// Removed modifiers are returned in encounter order; the remaining keys keep
/// their relative order. Returns `None` when nothing was removed.
///
/// # Examples
///
/// ```
/// use mongorules_engine::modifiers::extract_modifiers;
/// use serde_json::json;
///
/// let mut partial = json!({"$each": [1, 2, 3], "$slice": -5});
/// let mods = extract_modifiers(partial.as_object_mut().unwrap()).unwrap();
/// assert_eq!(mods[0].operator, "$slice");
/// assert_eq!(partial, json!({"$each": [1, 2, 3]}));
/// ```
pub fn extract_modifiers(partial: &mut Map<String, Value>) -> Option<Vec<Modifier>> {
    let mut removed = Vec::new();
    partial.retain(|key, value| {
        if is_operator_key(key) && key != EACH_KEY {
            removed.push(Modifier {
                operator: key.clone(),
                value: value.take(),
            });
            false
        } else {
            true
        }
    });
    if removed.is_empty() {
        None
    } else {
        Some(removed)
    }
}

/// Rebuild an `$each` payload: items first, then any other kept keys, then
/// the detached modifiers in their original order
pub fn reattach_modifiers(
    items: Vec<Value>,
    rest: Map<String, Value>,
    modifiers: &[Modifier],
) -> Value {
    let mut out = Map::with_capacity(rest.len() + modifiers.len() + 1);
    out.insert(EACH_KEY.to_string(), Value::Array(items));
    out.extend(rest.into_iter().filter(|(key, _)| key != EACH_KEY));
    for modifier in modifiers {
        out.insert(modifier.operator.clone(), modifier.value.clone());
    }
    Value::Object(out)
}
