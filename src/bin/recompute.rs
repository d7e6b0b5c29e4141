use anyhow::Result;
use clap::Parser;
use movierec::services::cache::RedisSnapshotCache;
use movierec::services::recommendation::RecommendationEngine;
use movierec::services::store::{PgStore, Stores};
use movierec::{init_tracing, Config};
use std::sync::Arc;
use tracing::{error, info};

/// Recompute taste profiles and recommendation snapshots outside the server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Account email to recompute. Repeat for several users.
    #[arg(short, long, required = true)]
    email: Vec<String>,

    /// Drop the stored snapshot instead of recomputing it.
    #[arg(long)]
    invalidate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using defaults and environment");
        Config::from_env()?
    };

    let store = Arc::new(PgStore::connect(&config.postgres).await?);
    let mut engine = RecommendationEngine::new(Stores::from_shared(store), config.recommendation.clone());
    if config.redis.enabled {
        let cache = RedisSnapshotCache::open(&config.redis.url, config.redis.ttl_seconds)?;
        engine = engine.with_cache(Arc::new(cache));
    }

    let mut failures = 0usize;
    for email in &args.email {
        let outcome = if args.invalidate {
            invalidate(&engine, email).await
        } else {
            engine.recompute_for_email(email).await.map(|summary| {
                info!(
                    "{}: {} recommendations from {} candidates (taste profile: {})",
                    email, summary.persisted, summary.candidate_count, summary.used_taste_profile
                );
            })
        };

        if let Err(e) = outcome {
            error!("Recompute failed for {}: {}", email, e);
            failures += 1;
        }
    }

    if failures > 0 {
        return Err(anyhow::anyhow!("{} of {} users failed", failures, args.email.len()));
    }
    Ok(())
}

async fn invalidate(engine: &RecommendationEngine, email: &str) -> movierec::Result<()> {
    let user_id = engine.resolve_user(email).await?;
    engine.invalidate_recommendations(user_id).await?;
    info!("Cleared recommendations for {}", email);
    Ok(())
}
