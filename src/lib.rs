pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;

use std::sync::Arc;

use crate::services::notifier::{Notifier, NotifierClient};

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub cache: cache::CacheService,
    pub config: config::Config,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;

        db.run_migrations().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        let cache = cache::CacheService::new(redis);
        let notifier: Arc<dyn Notifier> = Arc::new(NotifierClient::from_config(
            &config.notifier,
            &config.circuit_breaker,
        ));

        Ok(Arc::new(Self {
            db,
            cache,
            config,
            notifier,
        }))
    }
}
