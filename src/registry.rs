//! Model registry
//!
//! A [`Model`] owns one schema and one [`Preprocessor`] per operation. Models
//! are registered per database and collection and shared behind `Arc`, so a
//! registry can be read from many threads while models are added or removed.

use dashmap::DashMap;
use mongorules_engine::{cache_key_for, Operation, PreprocessConfig, PreprocessOutcome, Preprocessor};
use mongorules_schema::SchemaIndex;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{Result, RulesError};

/// Schema plus per-operation preprocessors for one collection
#[derive(Debug)]
pub struct Model {
    db: String,
    collection: String,
    schema: Arc<SchemaIndex>,
    preprocessors: Vec<Preprocessor>,
}

impl Model {
    pub fn new(db: &str, collection: &str, schema: SchemaIndex, config: PreprocessConfig) -> Self {
        let schema = Arc::new(schema);
        let preprocessors = Operation::ALL
            .iter()
            .map(|&op| Preprocessor::with_config(Arc::clone(&schema), op, config.clone()))
            .collect();
        Model {
            db: db.to_string(),
            collection: collection.to_string(),
            schema,
            preprocessors,
        }
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn schema(&self) -> &Arc<SchemaIndex> {
        &self.schema
    }

    pub fn preprocessor(&self, operation: Operation) -> &Preprocessor {
        // preprocessors are built in Operation::ALL order
        let index = Operation::ALL
            .iter()
            .position(|&op| op == operation)
            .unwrap_or_default();
        &self.preprocessors[index]
    }

    /// Preprocess `args` for `operation`, deriving the cache key from their shape
    pub fn preprocess(&self, operation: Operation, args: Vec<Value>) -> PreprocessOutcome {
        let cache_key = cache_key_for(operation, &self.collection, &args);
        self.preprocessor(operation).preprocess_from_cache(args, &cache_key)
    }

    /// Drop every cached payload set of every operation
    pub fn clear_cache(&self) {
        for preprocessor in &self.preprocessors {
            preprocessor.clear_cache();
        }
    }
}

/// Models keyed by database and collection
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: DashMap<(String, String), Arc<Model>>,
    config: PreprocessConfig,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose models use `config`
    pub fn with_config(config: PreprocessConfig) -> Result<Self> {
        config.validate()?;
        Ok(ModelRegistry {
            models: DashMap::new(),
            config,
        })
    }

    /// Registry configured from a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Self::with_config(PreprocessConfig::from_toml_str(s)?)
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Register a schema, replacing any model already registered
    pub fn add_model(&self, db: &str, collection: &str, schema: SchemaIndex) -> Arc<Model> {
        let model = Arc::new(Model::new(db, collection, schema, self.config.clone()));
        let key = (db.to_string(), collection.to_string());
        if self.models.insert(key, Arc::clone(&model)).is_some() {
            tracing::warn!(
                target: "mongorules::registry",
                db,
                collection,
                "Replaced existing model"
            );
        } else {
            tracing::debug!(target: "mongorules::registry", db, collection, "Model added");
        }
        model
    }

    /// Register a schema given as a flattened JSON object
    pub fn add_model_json(&self, db: &str, collection: &str, schema: &Value) -> Result<Arc<Model>> {
        let schema = SchemaIndex::from_json(schema)?;
        Ok(self.add_model(db, collection, schema))
    }

    pub fn remove_model(&self, db: &str, collection: &str) -> bool {
        self.models
            .remove(&(db.to_string(), collection.to_string()))
            .is_some()
    }

    pub fn model(&self, db: &str, collection: &str) -> Option<Arc<Model>> {
        self.models
            .get(&(db.to_string(), collection.to_string()))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Preprocess through a registered model
    pub fn preprocess(
        &self,
        db: &str,
        collection: &str,
        operation: Operation,
        args: Vec<Value>,
    ) -> Result<PreprocessOutcome> {
        let model = self
            .model(db, collection)
            .ok_or_else(|| RulesError::ModelNotFound {
                db: db.to_string(),
                collection: collection.to_string(),
            })?;
        Ok(model.preprocess(operation, args))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
