use ipolens_ai::ResearchEngine;
use ipolens_core::AuthConfig;
use ipolens_store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub engine: Arc<dyn ResearchEngine>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, engine: Arc<dyn ResearchEngine>, auth: AuthConfig) -> Self {
        Self {
            store,
            engine,
            auth: Arc::new(auth),
        }
    }
}
