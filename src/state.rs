use crate::config::AppConfig;
use crate::store::{self, DocumentStore};
use std::sync::Arc;

/// Shared state of the store emulator.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let mut backend = config.store.clone();
        backend.backend = config.emulator.backend;
        let store = store::connect(&backend).await?;
        Ok(Self {
            store,
            config: Arc::new(config),
        })
    }

    #[cfg(test)]
    pub fn from_parts(store: Arc<dyn DocumentStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = AppConfig::from_lookup(|_| None).expect("default config");
        Self {
            store: Arc::new(crate::store::memory::MemoryStore::new()),
            config: Arc::new(config),
        }
    }
}
