use crate::config::Config;
use crate::metrics::PredictMetrics;
use inference::{ClassNameTable, ModelCache, ModelLoader};
use std::sync::Arc;

/// Shared by every request; the model cache is the only mutable part.
pub struct AppState<L: ModelLoader> {
    pub cache: Arc<ModelCache<L>>,
    pub config: Arc<Config>,
    pub names: ClassNameTable,
    pub metrics: PredictMetrics,
}

impl<L: ModelLoader> AppState<L> {
    pub fn new(config: Config, loader: L) -> Self {
        Self {
            cache: Arc::new(ModelCache::new(loader)),
            config: Arc::new(config),
            names: ClassNameTable::LOST_AND_FOUND,
            metrics: PredictMetrics::default(),
        }
    }
}

impl<L: ModelLoader> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            config: Arc::clone(&self.config),
            names: self.names,
            metrics: self.metrics.clone(),
        }
    }
}
