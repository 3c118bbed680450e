//! Shared fixtures

use mongorules::{FieldRule, FieldType, Model, ModelRegistry, SchemaIndex};
use serde_json::Value;
use std::sync::Arc;

pub const DB: &str = "test";
pub const COLLECTION: &str = "users";

/// Users with an array of friends, each with nested arrays of nicknames
pub fn users_schema() -> SchemaIndex {
    SchemaIndex::builder()
        .field("account", FieldRule::typed(FieldType::Object))
        .field(
            "account.friends",
            FieldRule::typed(FieldType::array_of(FieldType::Object))
                .min_length(1)
                .max_length(2),
        )
        .field(
            "account.friends.name",
            FieldRule::typed(FieldType::String)
                .required()
                .min_length(1)
                .sanitize()
                .transform_with(|v: Value| match v {
                    Value::String(s) => Value::String(format!("{}!", s.to_lowercase())),
                    other => other,
                }),
        )
        .field(
            "account.friends.nicknames",
            FieldRule::typed(FieldType::array_of(FieldType::Object)).default_value(Value::Array(vec![])),
        )
        .field(
            "account.friends.nicknames.name",
            FieldRule::typed(FieldType::String).required(),
        )
        .field(
            "account.friends.nicknames.giver",
            FieldRule::typed(FieldType::array_of(FieldType::Object)),
        )
        .field(
            "account.friends.nicknames.giver.name",
            FieldRule::typed(FieldType::String).required(),
        )
        .field("account.friends.email", FieldRule::typed(FieldType::String).unique())
        .field("age", FieldRule::typed(FieldType::Integer))
        .field(
            "tags",
            FieldRule::typed(FieldType::array_of(FieldType::String)).max_length(3),
        )
        .field("profile", FieldRule::typed(FieldType::Object))
        .build()
        .unwrap()
}

/// Fresh registry holding the users model
pub fn users_model() -> Arc<Model> {
    let registry = ModelRegistry::new();
    registry.add_model(DB, COLLECTION, users_schema())
}

/// Property names of an error list, in order
pub fn kinds(errors: &[mongorules::FieldError]) -> Vec<&str> {
    errors.iter().map(|e| e.property.as_str()).collect()
}
