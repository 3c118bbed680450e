//! Preprocess Comprehensive Test Suite
//!
//! End-to-end checks of argument preprocessing through the public API.
//!
//! ## Test Groups
//!
//! - **insert**: documents with nested arrays of objects
//! - **update**: operator payloads, modifiers and positional keys
//! - **query**: filter field extraction and unknown-field rejection
//! - **cache**: reuse, isolation between calls, concurrency
//! - **paths**: path algebra properties
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test preprocess_comprehensive
//! ```

mod test_utils;

mod cache_behavior;
mod insert_arrays_of_objects;
mod path_properties;
mod query_fields;
mod update_operators;
