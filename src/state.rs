//! Shared application state, immutable after start.

use crate::config::{ModelRegistry, Settings};
use crate::store::RowStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub store: Arc<dyn RowStore>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(registry: ModelRegistry, store: Arc<dyn RowStore>, settings: Settings) -> Self {
        AppState {
            registry: Arc::new(registry),
            store,
            settings: Arc::new(settings),
        }
    }
}
