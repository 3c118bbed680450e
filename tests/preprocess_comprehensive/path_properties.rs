//! Path algebra properties over generated keys and documents

use mongorules_core::{flatten_document, normalize_path, FieldPath};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,6}",
        "[0-9]{1,3}",
        Just("$".to_string()),
        Just("$each".to_string()),
        Just("$elemMatch".to_string()),
    ]
}

fn live_key() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..6).prop_map(|segs| segs.join("."))
}

fn document() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[a-z]{0,4}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,4}", inner), 0..3)
                .prop_map(|pairs| Value::Object(pairs.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

proptest! {
    #[test]
    fn prop_normalize_is_idempotent(key in live_key()) {
        let once = normalize_path(&key);
        prop_assert_eq!(normalize_path(&once), once);
    }

    #[test]
    fn prop_normalized_paths_have_no_markers(key in live_key()) {
        let path = FieldPath::normalize(&key);
        for seg in path.segments() {
            prop_assert!(!seg.starts_with('$'));
            prop_assert!(!seg.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn prop_flattened_paths_are_canonical(doc in document()) {
        for path in flatten_document(&doc) {
            prop_assert_eq!(normalize_path(&path), path.clone());
            prop_assert!(!path.is_empty());
        }
    }
}

#[test]
fn test_flatten_nested_arrays() {
    let doc = json!({"account": {"friends": [{"name": "a", "tags": ["x"]}, {"name": "b"}]}});
    let paths = flatten_document(&doc);
    assert_eq!(
        paths,
        vec![
            "account.friends",
            "account.friends.name",
            "account.friends.tags",
            "account.friends.name",
        ]
    );
}
