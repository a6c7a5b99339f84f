use std::sync::Arc;

use crate::application::EmbedService;
use crate::infrastructure::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub embed_service: Arc<EmbedService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(embed_service: Arc<EmbedService>, config: AppConfig) -> Self {
        Self {
            embed_service,
            config: Arc::new(config),
        }
    }
}
