//! Update operator payloads

use crate::test_utils::*;
use mongorules::{FieldError, Operation};
use serde_json::json;

#[test]
fn test_set_positional_element_field() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Update,
        vec![
            json!({"account.friends.name": "jay!"}),
            json!({"$set": {"account.friends.$.name": "LOU"}}),
        ],
    );
    assert!(outcome.is_ok());
    assert_eq!(outcome.args[1], json!({"$set": {"account.friends.$.name": "lou!"}}));
}

#[test]
fn test_set_indexed_element() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Update,
        vec![json!({}), json!({"$set": {"account.friends.1": {"name": "Bo"}}})],
    );
    assert_eq!(
        outcome.args[1]["$set"]["account.friends.1"],
        json!({"name": "bo!", "nicknames": []})
    );

    let outcome = model.preprocess(
        Operation::Update,
        vec![json!({}), json!({"$set": {"account.friends.1": {}}})],
    );
    assert_eq!(
        outcome.errors.unwrap(),
        vec![FieldError::required("account.friends.1.name")]
    );
}

#[test]
fn test_set_whole_subdocument() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Update,
        vec![json!({}), json!({"$set": {"account": {"friends": [{"name": "Ann"}]}}})],
    );
    assert_eq!(
        outcome.args[1]["$set"]["account"],
        json!({"friends": [{"name": "ann!", "nicknames": []}]})
    );
}

#[test]
fn test_push_with_modifiers() {
    let model = users_model();
    let update = json!({"$push": {"account.friends": {
        "$each": [{"name": "A"}, {"name": "B"}],
        "$slice": -2,
        "$sort": {"name": 1}
    }}});
    let outcome = model.preprocess(Operation::Update, vec![json!({}), update]);
    assert!(outcome.is_ok());
    let pushed = &outcome.args[1]["$push"]["account.friends"];
    assert_eq!(
        pushed,
        &json!({
            "$each": [{"name": "a!", "nicknames": []}, {"name": "b!", "nicknames": []}],
            "$slice": -2,
            "$sort": {"name": 1}
        })
    );
    let keys: Vec<_> = pushed.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["$each", "$slice", "$sort"]);
}

#[test]
fn test_push_single_element() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Update,
        vec![json!({}), json!({"$push": {"tags": "x", "account.friends": {}}})],
    );
    assert_eq!(
        outcome.errors.unwrap(),
        vec![FieldError::required("account.friends.name")]
    );

    let outcome = model.preprocess(
        Operation::Update,
        vec![json!({}), json!({"$addToSet": {"tags": 5}})],
    );
    assert_eq!(
        outcome.errors.unwrap(),
        vec![FieldError::type_mismatch("tags", "string")]
    );
}

#[test]
fn test_push_each_not_array() {
    let model = users_model();
    let input = vec![json!({}), json!({"$push": {"tags": {"$each": "x", "$slice": 1}}})];
    let outcome = model.preprocess(Operation::Update, input.clone());
    assert_eq!(kinds(&outcome.errors.unwrap()), vec!["type"]);
    assert_eq!(outcome.args, input);
}

#[test]
fn test_arithmetic_operators() {
    let model = users_model();
    let ok = model.preprocess(Operation::Update, vec![json!({}), json!({"$inc": {"age": 1}})]);
    assert!(ok.is_ok());
    let bad = model.preprocess(
        Operation::Update,
        vec![json!({}), json!({"$inc": {"age": "1"}, "$mul": {"tags": 2}})],
    );
    let errors = bad.errors.unwrap();
    assert_eq!(kinds(&errors), vec!["type", "type"]);
    assert_eq!(errors[1].path, "tags");
}

#[test]
fn test_pass_through_operators_check_unknown_only() {
    let model = users_model();
    let ok = model.preprocess(
        Operation::Update,
        vec![json!({}), json!({"$unset": {"age": ""}, "$pull": {"tags": "x"}})],
    );
    assert!(ok.is_ok());
    assert_eq!(ok.args[1], json!({"$unset": {"age": ""}, "$pull": {"tags": "x"}}));

    let bad = model.preprocess(
        Operation::Update,
        vec![json!({}), json!({"$unset": {"nickname": ""}})],
    );
    assert_eq!(bad.errors.unwrap(), vec![FieldError::unknown("nickname")]);
}

#[test]
fn test_replacement_document() {
    let model = users_model();
    let outcome = model.preprocess(
        Operation::Update,
        vec![json!({"age": 3}), json!({"account": {"friends": [{"name": "Z"}]}})],
    );
    assert_eq!(
        outcome.args[1],
        json!({"account": {"friends": [{"name": "z!", "nicknames": []}]}})
    );
}

#[test]
fn test_options_pass_through() {
    let model = users_model();
    let options = json!({"upsert": true, "anything": {"goes": 1}});
    let outcome = model.preprocess(
        Operation::Update,
        vec![json!({}), json!({"$set": {"age": 2}}), options.clone()],
    );
    assert!(outcome.is_ok());
    assert_eq!(outcome.args[2], options);
}

#[test]
fn test_malformed_update_documents() {
    let model = users_model();
    let mixed = model.preprocess(
        Operation::Update,
        vec![json!({}), json!({"$set": {"age": 2}, "age": 3})],
    );
    assert_eq!(mixed.errors.unwrap()[0].path, "age");

    let unsupported = model.preprocess(
        Operation::Update,
        vec![json!({}), json!({"$elemMatch": {"age": 2}})],
    );
    assert_eq!(kinds(&unsupported.errors.unwrap()), vec!["unknown"]);
}
