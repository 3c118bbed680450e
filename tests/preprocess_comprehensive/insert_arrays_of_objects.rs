//! Inserts of documents holding arrays of objects

use crate::test_utils::*;
use mongorules::{FieldError, Operation};
use serde_json::json;

#[test]
fn test_missing_required_element_field() {
    let model = users_model();
    let outcome = model.preprocess(Operation::Insert, vec![json!({"account": {"friends": [{}]}})]);
    let errors = outcome.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].property, "required");
    assert_eq!(errors[0].path, "account.friends.0.name");
}

#[test]
fn test_null_counts_as_missing() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Insert,
        vec![json!({"account": {"friends": [{"name": null}]}})],
    );
    assert_eq!(kinds(&outcome.errors.unwrap()), vec!["required"]);
}

#[test]
fn test_custom_transform_on_element() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Insert,
        vec![json!({"account": {"friends": [{"name": "JAY"}]}})],
    );
    assert!(outcome.is_ok());
    assert_eq!(outcome.args[0]["account"]["friends"][0]["name"], json!("jay!"));
}

#[test]
fn test_min_length_on_string_and_array() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Insert,
        vec![json!({"account": {"friends": [{"name": ""}]}})],
    );
    let errors = outcome.errors.unwrap();
    assert_eq!(kinds(&errors), vec!["minLength"]);
    assert_eq!(errors[0].path, "account.friends.0.name");

    let outcome = model.preprocess(Operation::Insert, vec![json!({"account": {"friends": []}})]);
    let errors = outcome.errors.unwrap();
    assert_eq!(kinds(&errors), vec!["minLength"]);
    assert_eq!(errors[0].path, "account.friends");
}

#[test]
fn test_max_length_skips_elements() {
    let model = users_model();
    let doc = json!({"account": {"friends": [{"name": "jay"}, {"name": "jay"}, {}]}});
    let outcome = model.preprocess(Operation::Insert, vec![doc]);
    assert_eq!(kinds(&outcome.errors.unwrap()), vec!["maxLength"]);
}

#[test]
fn test_type_violation_on_element_field() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Insert,
        vec![json!({"account": {"friends": [{"name": 1}]}})],
    );
    let errors = outcome.errors.unwrap();
    assert_eq!(errors, vec![FieldError::type_mismatch("account.friends.0.name", "string")]);
}

#[test]
fn test_sanitize_then_transform() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Insert,
        vec![json!({"account": {"friends": [{"name": "<script>JAY</script>"}]}})],
    );
    assert_eq!(
        outcome.args[0]["account"]["friends"][0]["name"],
        json!("&lt;script&gt;jay&lt;/script&gt;!")
    );
}

#[test]
fn test_defaults_written_back() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Insert,
        vec![json!({"account": {"friends": [{"name": "jay"}]}})],
    );
    assert_eq!(
        outcome.args[0]["account"]["friends"],
        json!([{"name": "jay!", "nicknames": []}])
    );
}

#[test]
fn test_deeply_nested_document() {
    let model = users_model();
    let doc = json!({
        "account": {
            "friends": [
                {"name": "jay", "nicknames": [{"name": "gus", "giver": [{"name": "flip"}]}]},
                {"name": "lou"}
            ]
        }
    });
    let outcome = model.preprocess(Operation::Insert, vec![doc]);
    assert!(outcome.is_ok(), "{:?}", outcome.errors);
    assert_eq!(
        outcome.args[0],
        json!({
            "account": {
                "friends": [
                    {"name": "jay!", "nicknames": [{"name": "gus", "giver": [{"name": "flip"}]}]},
                    {"name": "lou!", "nicknames": []}
                ]
            }
        })
    );
}

#[test]
fn test_errors_from_every_level() {
    let model = users_model();
    let doc = json!({
        "account": {
            "friends": [
                {"name": "jay", "nicknames": [{"giver": [{}]}]},
                {}
            ]
        },
        "age": 1.5
    });
    let input = vec![doc];
    let outcome = model.preprocess(Operation::Insert, input.clone());
    let errors = outcome.errors.clone().unwrap();
    let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "account.friends.0.nicknames.0.name",
            "account.friends.0.nicknames.0.giver.0.name",
            "account.friends.1.name",
            "age",
        ]
    );
    assert_eq!(outcome.args, input);
}

#[test]
fn test_unique_within_one_array() {
    let model = users_model();
    let doc = json!({"account": {"friends": [
        {"name": "a", "email": "x@example.com"},
        {"name": "b", "email": "x@example.com"}
    ]}});
    let outcome = model.preprocess(Operation::Insert, vec![doc]);
    assert_eq!(
        outcome.errors.unwrap(),
        vec![FieldError::unique("account.friends.1.email")]
    );

    let doc = json!({"account": {"friends": [
        {"name": "a", "email": "x@example.com"},
        {"name": "b", "email": "y@example.com"}
    ]}});
    assert!(model.preprocess(Operation::Insert, vec![doc]).is_ok());
}

#[test]
fn test_unknown_field_rejected() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Insert,
        vec![json!({"_id": {"$oid": "507f1f77bcf86cd799439011"}, "nickname": "x", "profile": {"bio": "hi"}})],
    );
    assert_eq!(outcome.errors.unwrap(), vec![FieldError::unknown("nickname")]);
}

#[test]
fn test_insert_many() {
    let model = users_model();
    let docs = json!([
        {"account": {"friends": [{"name": "A"}]}},
        {"age": 3}
    ]);
    let outcome = model.preprocess(Operation::Insert, vec![docs]);
    assert!(outcome.is_ok());
    assert_eq!(outcome.args[0][0]["account"]["friends"][0]["name"], json!("a!"));
    assert_eq!(outcome.args[0][1], json!({"age": 3}));

    let outcome = model.preprocess(Operation::Insert, vec![json!([{"age": 3}, {"age": "x"}])]);
    assert_eq!(outcome.errors.unwrap()[0].path, "1.age");
}

#[test]
fn test_non_object_document() {
    let model = users_model();
    let outcome = model.preprocess(Operation::Insert, vec![json!("not a document")]);
    let errors = outcome.errors.unwrap();
    assert_eq!(kinds(&errors), vec!["type"]);
    assert_eq!(errors[0].path, "");
}
