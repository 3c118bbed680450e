//! Query field extraction
//!
//! Walks a Mongo-style filter and reports every canonical field path it
//! references, unwinding logical combinators and `$elemMatch` along the way.

use rustc_hash::FxHashSet;
use serde_json::{Map, Value};

use crate::operator::{is_operator_key, Operator, OPERATOR_SIGIL};
use crate::path::{join_live, normalize_path, PATH_SEP};

/// Length of the hex string inside an extended-JSON ObjectId
const OBJECT_ID_HEX_LEN: usize = 24;

/// Check whether a value is an ObjectId in extended-JSON form
///
/// `{"$oid": "<24 hex chars>"}` is a scalar identifier, not a nested document,
/// and must never be recursed into.
pub fn is_object_id(value: &Value) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };
    if map.len() != 1 {
        return false;
    }
    match map.get("$oid") {
        Some(Value::String(hex)) => {
            hex.len() == OBJECT_ID_HEX_LEN && hex.bytes().all(|b| b.is_ascii_hexdigit())
        }
        _ => false,
    }
}

/// Extract the canonical fields a query references
///
/// `parent` prefixes every field found, as if the query were nested under it.
/// The result is deduplicated (first occurrence wins); only membership is
/// meaningful.
///
/// - Array-valued operators (`$and`, `$or`, `$nor`, ...) recurse into their
///   object elements under the current parent. Value-list operators (`$in`,
///   `$nin`, `$all`) are match values, not sub-queries.
/// - `$elemMatch` children inherit the parent field (`a.$elemMatch.b` → `a.b`).
/// - An object value that yields no fields (`{age: {$gt: 5}}`) makes its key a
///   leaf field.
pub fn extract_query_fields(query: &Value, parent: Option<&str>) -> Vec<String> {
    let mut raw = Vec::new();
    if let Value::Object(map) = query {
        collect_query_fields(map, parent.unwrap_or(""), &mut raw);
    }

    let mut seen = FxHashSet::default();
    raw.iter()
        .map(|field| normalize_path(field))
        .filter(|field| !field.is_empty() && !is_operator_key(field))
        .filter(|field| seen.insert(field.clone()))
        .collect()
}

fn collect_query_fields(query: &Map<String, Value>, parent: &str, out: &mut Vec<String>) {
    for (key, value) in query {
        let (scope, op) = resolve_key(parent, key);

        match (op, value) {
            (Some(op), Value::Array(items)) => {
                if !op.is_value_list() {
                    for item in items {
                        if let Value::Object(sub_query) = item {
                            collect_query_fields(sub_query, &scope, out);
                        }
                    }
                }
                continue;
            }
            (Some(Operator::ElemMatch), Value::Object(children)) => {
                collect_query_fields(children, &scope, out);
                continue;
            }
            (_, Value::Object(children)) if !is_object_id(value) => {
                let mut nested = Vec::new();
                collect_query_fields(children, &scope, &mut nested);
                if !nested.is_empty() {
                    out.extend(nested);
                    continue;
                }
            }
            _ => {}
        }

        if op.is_none() {
            out.push(scope);
        }
    }
}

/// Resolve a query key against its parent
///
/// Returns the field scope the key's value applies to and the operator the key
/// names, if any. A bare operator keeps the parent scope; `field.$op` scopes to
/// `parent.field`.
fn resolve_key(parent: &str, key: &str) -> (String, Option<Operator>) {
    if let Some(op) = Operator::lookup(key) {
        return (parent.to_string(), Some(op));
    }
    if let Some((prefix, last)) = key.rsplit_once(PATH_SEP) {
        if last.len() > 1 && last.starts_with(OPERATOR_SIGIL) {
            return (join_live(parent, prefix), Operator::lookup(last));
        }
    }
    (join_live(parent, key), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(query: Value) -> Vec<String> {
        let mut out = extract_query_fields(&query, None);
        out.sort();
        out
    }

    #[test]
    fn test_plain_fields() {
        assert_eq!(fields(json!({"name": "jay", "age": 3})), vec!["age", "name"]);
    }

    #[test]
    fn test_logical_and() {
        assert_eq!(fields(json!({"$and": [{"a": 1}, {"b": 2}]})), vec!["a", "b"]);
    }

    #[test]
    fn test_nested_logical() {
        let query = json!({"$or": [{"a": 1}, {"$and": [{"b.c": 2}, {"d": {"$gt": 1}}]}]});
        assert_eq!(fields(query), vec!["a", "b.c", "d"]);
    }

    #[test]
    fn test_elem_match_suffix_key() {
        assert_eq!(fields(json!({"a.$elemMatch": {"b": 1}})), vec!["a.b"]);
    }

    #[test]
    fn test_elem_match_nested_form() {
        assert_eq!(fields(json!({"a": {"$elemMatch": {"b": 1, "c": {"$lt": 3}}}})), vec!["a.b", "a.c"]);
    }

    #[test]
    fn test_empty_elem_match_makes_parent_a_leaf() {
        assert_eq!(fields(json!({"a": {"$elemMatch": {}}})), vec!["a"]);
    }

    #[test]
    fn test_elem_match_with_sibling_operator() {
        // The sibling `$size` contributes no field; elemMatch children win
        assert_eq!(fields(json!({"a": {"$elemMatch": {"b": 1}, "$size": 2}})), vec!["a.b"]);
    }

    #[test]
    fn test_comparison_object_is_leaf() {
        assert_eq!(fields(json!({"name": {"$gt": 5}})), vec!["name"]);
        assert_eq!(fields(json!({"name": {"$not": {"$regex": "^j"}}})), vec!["name"]);
    }

    #[test]
    fn test_nested_document_fields() {
        assert_eq!(fields(json!({"account": {"name": "jay"}})), vec!["account.name"]);
    }

    #[test]
    fn test_object_id_is_scalar() {
        let query = json!({"_id": {"$oid": "507f1f77bcf86cd799439011"}});
        assert_eq!(fields(query), vec!["_id"]);
    }

    #[test]
    fn test_value_list_operators_are_leaves() {
        assert_eq!(fields(json!({"tags": {"$in": [{"a": 1}, "x"]}})), vec!["tags"]);
    }

    #[test]
    fn test_positional_and_index_keys_normalize() {
        assert_eq!(fields(json!({"friends.0.name": "jay", "friends.$.age": 2})), vec!["friends.age", "friends.name"]);
    }

    #[test]
    fn test_operators_never_reported() {
        assert!(fields(json!({"$where": "this.a > 1", "$text": {"$search": "x"}})).is_empty());
    }

    #[test]
    fn test_duplicates_removed() {
        let out = extract_query_fields(&json!({"$or": [{"a": 1}, {"a": 2}]}), None);
        assert_eq!(out, vec!["a"]);
    }

    #[test]
    fn test_parent_prefix() {
        let out = extract_query_fields(&json!({"b": 1}), Some("a"));
        assert_eq!(out, vec!["a.b"]);
    }

    #[test]
    fn test_non_object_query_is_empty() {
        assert!(extract_query_fields(&json!([1, 2]), None).is_empty());
    }

    #[test]
    fn test_is_object_id() {
        assert!(is_object_id(&json!({"$oid": "507f1f77bcf86cd799439011"})));
        assert!(!is_object_id(&json!({"$oid": "nothex"})));
        assert!(!is_object_id(&json!({"$oid": "507f1f77bcf86cd799439011", "x": 1})));
        assert!(!is_object_id(&json!("507f1f77bcf86cd799439011")));
    }
}
