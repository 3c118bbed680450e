//! Cache reuse, pass isolation and concurrency

use crate::test_utils::*;
use mongorules::{cache_key_for, Operation, PreprocessConfig, Preprocessor};
use serde_json::json;
use std::sync::Arc;
use std::thread;

#[test]
fn test_sequential_calls_same_key_are_independent() {
    let model = users_model();
    let first = model.preprocess(
        Operation::Insert,
        vec![json!({"account": {"friends": [{"name": "A", "email": "a@x"}]}})],
    );
    assert!(first.is_ok());
    let second = model.preprocess(
        Operation::Insert,
        vec![json!({"account": {"friends": [{"name": "B", "email": "a@x"}]}})],
    );
    assert!(second.is_ok(), "unique memo leaked: {:?}", second.errors);
    assert_eq!(second.args[0]["account"]["friends"][0]["name"], json!("b!"));
}

#[test]
fn test_failed_pass_leaves_no_state() {
    let schema = Arc::new(users_schema());
    let pre = Preprocessor::new(schema, Operation::Insert);
    let bad = pre.preprocess_from_cache(vec![json!({"age": "x", "tags": ["a"]})], "k");
    assert!(!bad.is_ok());
    let good = pre.preprocess_from_cache(vec![json!({"age": 1})], "k");
    assert_eq!(good.args, vec![json!({"age": 1})]);
}

#[test]
fn test_same_shape_shares_cache_entry() {
    let schema = Arc::new(users_schema());
    let pre = Preprocessor::new(schema, Operation::Insert);
    for age in 0..5 {
        let args = vec![json!({"age": age})];
        let key = cache_key_for(Operation::Insert, COLLECTION, &args);
        assert!(pre.preprocess_from_cache(args, &key).is_ok());
    }
    let stats = pre.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 4);
    assert_eq!(stats.entries, 1);
}

#[test]
fn test_bounded_cache() {
    let schema = Arc::new(users_schema());
    let pre = Preprocessor::with_config(
        schema,
        Operation::Find,
        PreprocessConfig::new().max_cache_entries(2),
    );
    for i in 0..5 {
        let key = format!("k{}", i);
        assert!(pre.preprocess_from_cache(vec![json!({"age": i})], &key).is_ok());
    }
    assert_eq!(pre.cache_stats().entries, 2);
    assert_eq!(pre.cache_stats().evictions, 3);
}

#[test]
fn test_concurrent_distinct_keys() {
    let model = users_model();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let model = Arc::clone(&model);
            thread::spawn(move || {
                for round in 0..50 {
                    let name = format!("N{}R{}", i, round);
                    let doc = if i % 2 == 0 {
                        json!({"account": {"friends": [{"name": name}]}})
                    } else {
                        json!({"age": round, "tags": [name]})
                    };
                    let outcome = model.preprocess(Operation::Insert, vec![doc]);
                    assert!(outcome.is_ok(), "{:?}", outcome.errors);
                    if i % 2 == 0 {
                        assert_eq!(
                            outcome.args[0]["account"]["friends"][0]["name"],
                            json!(format!("n{}r{}!", i, round))
                        );
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_concurrent_same_key() {
    let schema = Arc::new(users_schema());
    let pre = Arc::new(Preprocessor::new(schema, Operation::Insert));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let pre = Arc::clone(&pre);
            thread::spawn(move || {
                for round in 0..50 {
                    let doc = if round % 3 == 0 {
                        json!({"account": {"friends": [{}]}})
                    } else {
                        json!({"account": {"friends": [{"name": format!("T{}", i)}]}})
                    };
                    let outcome = pre.preprocess_from_cache(vec![doc.clone()], "shared");
                    if round % 3 == 0 {
                        assert_eq!(outcome.args, vec![doc]);
                        assert_eq!(kinds(&outcome.errors.unwrap()), vec!["required"]);
                    } else {
                        assert_eq!(
                            outcome.args[0]["account"]["friends"][0]["name"],
                            json!(format!("t{}!", i))
                        );
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
