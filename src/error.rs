/// Errors raised by the recommendation engine and its stores.
#[derive(thiserror::Error, Debug)]
pub enum RecError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Recompute queue is full, dropped job for {0}")]
    QueueFull(String),

    #[error("Recompute queue is closed")]
    QueueClosed,

    #[error("Recompute for {0} timed out after {1}s")]
    Timeout(String, u64),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl RecError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RecError::UserNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, RecError>;
