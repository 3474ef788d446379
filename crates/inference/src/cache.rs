//! Process-lifetime cache of loaded models, keyed by model identifier.
//!
//! A single lock guards both lookups and inserts and is held for the whole
//! load, so a given key is loaded at most once. The cost is that every
//! lookup waits while any model is loading; loads happen once per key.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Produces a model for a key. Called at most once per key by [`ModelCache`].
pub trait ModelLoader: Send + Sync {
    type Model: Send + Sync;

    fn load(&self, key: &str) -> anyhow::Result<Self::Model>;
}

pub struct ModelCache<L: ModelLoader> {
    loader: L,
    models: Mutex<HashMap<String, Arc<L::Model>>>,
}

impl<L: ModelLoader> ModelCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            models: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached model for `key`, loading it on first use.
    ///
    /// A failed load is returned to the caller and leaves no entry behind.
    pub fn get_or_load(&self, key: &str) -> anyhow::Result<Arc<L::Model>> {
        if key.is_empty() {
            anyhow::bail!("Model key must not be empty");
        }

        let mut models = self.models.lock();

        if let Some(model) = models.get(key) {
            tracing::trace!(model = key, "Model cache hit");
            return Ok(Arc::clone(model));
        }

        tracing::info!(model = key, "Loading model");
        let start = Instant::now();

        let model = Arc::new(self.loader.load(key)?);
        models.insert(key.to_string(), Arc::clone(&model));

        tracing::info!(
            model = key,
            elapsed_ms = start.elapsed().as_millis() as u64,
            cached = models.len(),
            "Model loaded and cached"
        );

        Ok(model)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.models.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.models.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.lock().is_empty()
    }

    /// Snapshot of the cached models, ordered by key.
    pub fn loaded(&self) -> Vec<(String, Arc<L::Model>)> {
        let mut entries: Vec<_> = self
            .models
            .lock()
            .iter()
            .map(|(key, model)| (key.clone(), Arc::clone(model)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
