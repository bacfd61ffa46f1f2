use std::sync::Arc;

use crate::config::ServerConfig;
use crate::middleware::OriginPolicy;

/// Shared application state
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    /// Allow-list compiled from `config.allowed_origins`
    pub origin_policy: OriginPolicy,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let origin_policy = OriginPolicy::new(&config.allowed_origins);
        Arc::new(Self {
            config,
            origin_policy,
        })
    }
}
