use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub recommendation: RecommendationConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        let ip = self
            .host
            .parse::<IpAddr>()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(ip, self.port)
    }

    /// Tokio worker threads for the server runtime, at least one.
    pub fn worker_threads(&self) -> usize {
        self.workers.max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub enabled: bool,
    pub url: String,
    pub ttl_seconds: u64,
}

/// Sizes of the candidate pools and the persisted snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub embedding_dim: usize,
    pub embedding_pool: usize,
    pub collaborative_pool: usize,
    pub genre_pool: usize,
    pub snapshot_size: usize,
    pub default_fetch_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub queue_capacity: usize,
    pub max_concurrent_jobs: usize,
    /// Zero disables the per-job timeout.
    pub job_timeout_seconds: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 128,
            embedding_pool: 50,
            collaborative_pool: 200,
            genre_pool: 200,
            snapshot_size: 20,
            default_fetch_limit: 20,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_concurrent_jobs: num_cpus::get(),
            job_timeout_seconds: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: num_cpus::get(),
            },
            postgres: PostgresConfig {
                url: "postgresql://localhost:5432/movies".to_string(),
                max_connections: 10,
            },
            redis: RedisConfig {
                enabled: false,
                url: "redis://localhost:6379".to_string(),
                ttl_seconds: 3600,
            },
            recommendation: RecommendationConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("MOVIEREC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Defaults overridden by `MOVIEREC__SECTION__KEY` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(
                config::Environment::with_prefix("MOVIEREC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
