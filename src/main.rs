use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Parser;
use movierec::utils::validation::{resolve_fetch_limit, validate_email};
use movierec::{init_tracing, AppState, Config, MovieSummary, RecError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,
}

#[derive(Debug, Deserialize)]
struct RecommendationQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    message: String,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message,
        }
    }
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), (StatusCode, Json<ApiResponse<T>>)>;

fn failure<T>(e: RecError) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = match &e {
        RecError::InvalidInput(_) | RecError::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
        RecError::UserNotFound(_) => StatusCode::NOT_FOUND,
        RecError::QueueFull(_) | RecError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::error(e.to_string())))
}

async fn health_check() -> Json<ApiResponse<HashMap<String, String>>> {
    let mut status = HashMap::new();
    status.insert("status".to_string(), "healthy".to_string());
    status.insert("service".to_string(), "movierec".to_string());
    status.insert("version".to_string(), env!("CARGO_PKG_VERSION").to_string());

    Json(ApiResponse::success(status))
}

async fn get_recommendations(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Query(params): Query<RecommendationQuery>,
) -> ApiResult<Vec<MovieSummary>> {
    let settings = &state.config.recommendation;
    let limit = resolve_fetch_limit(params.limit, settings.default_fetch_limit, settings.snapshot_size)
        .map_err(failure)?;

    match state.engine.fetch_for_email(&email, limit).await {
        Ok(movies) => Ok((StatusCode::OK, Json(ApiResponse::success(movies)))),
        Err(e) => {
            error!("Failed to get recommendations: {}", e);
            Err(failure(e))
        }
    }
}

/// Called by the collection handlers after a favorite or watchlist change.
async fn refresh_recommendations(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<String> {
    validate_email(&email).map_err(failure)?;

    match state.queue.submit(&email) {
        Ok(job_id) => Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(job_id.to_string())))),
        Err(e) => {
            error!("Failed to queue recommendation refresh: {}", e);
            Err(failure(e))
        }
    }
}

async fn invalidate_recommendations(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<String> {
    let user_id = state.engine.resolve_user(&email).await.map_err(failure)?;

    match state.engine.invalidate_recommendations(user_id).await {
        Ok(()) => Ok((StatusCode::OK, Json(ApiResponse::success("Recommendations cleared".to_string())))),
        Err(e) => {
            error!("Failed to invalidate recommendations: {}", e);
            Err(failure(e))
        }
    }
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/users/:email/recommendations",
            get(get_recommendations).delete(invalidate_recommendations),
        )
        .route("/users/:email/recommendations/refresh", post(refresh_recommendations))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using defaults and environment");
        Config::from_env()?
    };
    info!("Starting movierec server with config: {:?}", config.server);

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.worker_threads())
        .enable_all()
        .build()?
        .block_on(serve(config))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let (state, queue_handle) = AppState::new(config.clone()).await?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.socket_addr()).await?;
    info!(
        "Server listening on {} with {} worker threads",
        config.server.socket_addr(),
        config.server.worker_threads()
    );

    axum::serve(listener, app).await?;

    queue_handle.abort();
    Ok(())
}
