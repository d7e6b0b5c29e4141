pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{RecError, Result};
pub use models::*;

use services::cache::RedisSnapshotCache;
use services::queue::RecomputeQueue;
use services::recommendation::RecommendationEngine;
use services::store::{PgStore, Stores};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<RecommendationEngine>,
    pub queue: RecomputeQueue,
}

impl AppState {
    /// Production wiring: PostgreSQL stores, optional Redis snapshot cache
    /// and a running recompute queue.
    pub async fn new(config: Config) -> anyhow::Result<(Self, JoinHandle<()>)> {
        let store = Arc::new(PgStore::connect(&config.postgres).await?);

        let mut engine =
            RecommendationEngine::new(Stores::from_shared(store), config.recommendation.clone());
        if config.redis.enabled {
            let cache = RedisSnapshotCache::open(&config.redis.url, config.redis.ttl_seconds)?;
            engine = engine.with_cache(Arc::new(cache));
            info!("Snapshot cache enabled at {}", config.redis.url);
        }

        Ok(Self::with_engine(config, Arc::new(engine)))
    }

    pub fn with_engine(config: Config, engine: Arc<RecommendationEngine>) -> (Self, JoinHandle<()>) {
        let (queue, handle) = RecomputeQueue::start(engine.clone(), &config.worker);
        let state = Self {
            config: Arc::new(config),
            engine,
            queue,
        };
        (state, handle)
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
