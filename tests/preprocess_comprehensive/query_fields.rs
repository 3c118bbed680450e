//! Filters: field extraction and unknown-field rejection

use crate::test_utils::*;
use mongorules::{FieldError, Operation};
use mongorules_core::extract_query_fields;
use serde_json::json;

#[test]
fn test_logical_operators_flatten() {
    let fields = extract_query_fields(&json!({"$and": [{"a": 1}, {"b": 2}]}), None);
    assert_eq!(fields, vec!["a", "b"]);
}

#[test]
fn test_elem_match_suffix() {
    let fields = extract_query_fields(&json!({"a.$elemMatch": {"b": 1}}), None);
    assert_eq!(fields, vec!["a.b"]);
}

#[test]
fn test_object_id_is_a_leaf() {
    let fields = extract_query_fields(
        &json!({"_id": {"$oid": "507f1f77bcf86cd799439011"}}),
        None,
    );
    assert_eq!(fields, vec!["_id"]);
}

#[test]
fn test_find_accepts_declared_fields() {
    let model = users_model();
    let filter = json!({
        "$or": [
            {"account.friends.name": "jay!"},
            {"account.friends": {"$elemMatch": {"nicknames.name": "gus"}}}
        ],
        "age": {"$gte": 18, "$lt": 65},
        "tags": {"$in": ["a", "b"]}
    });
    for op in [Operation::Find, Operation::FindOne, Operation::Count, Operation::Remove] {
        let outcome = model.preprocess(op, vec![filter.clone()]);
        assert!(outcome.is_ok(), "{} rejected: {:?}", op, outcome.errors);
        assert_eq!(outcome.args, vec![filter.clone()]);
    }
}

#[test]
fn test_find_rejects_unknown_fields() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Find,
        vec![json!({"$and": [{"age": 1}, {"height": {"$gt": 2}}], "account.nick": "x"})],
    );
    assert_eq!(
        outcome.errors.unwrap(),
        vec![FieldError::unknown("height"), FieldError::unknown("account.nick")]
    );
}

#[test]
fn test_find_open_object_paths() {
    let model = users_model();
    let outcome = model.preprocess(Operation::Find, vec![json!({"profile.bio.lang": "en"})]);
    assert!(outcome.is_ok());
}

#[test]
fn test_find_without_filter() {
    let model = users_model();
    assert!(model.preprocess(Operation::Find, vec![]).is_ok());
    let outcome = model.preprocess(Operation::FindOne, vec![json!(5)]);
    assert_eq!(kinds(&outcome.errors.unwrap()), vec!["type"]);
}

#[test]
fn test_update_filter_checked() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Update,
        vec![json!({"ghost": 1}), json!({"$set": {"age": 1}})],
    );
    assert_eq!(outcome.errors.unwrap(), vec![FieldError::unknown("ghost")]);
}
