use swapgraph_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no state has been persisted yet")]
    NotFound,
    #[error("expected version {expected} but current version is {actual}")]
    Conflict { expected: u64, actual: u64 },
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn log_level(&self) -> tracing::Level {
        match self {
            StoreError::Conflict { .. } => tracing::Level::WARN,
            StoreError::NotFound => tracing::Level::INFO,
            _ => tracing::Level::ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::not_found(err.to_string()),
            StoreError::Conflict { .. } => AppError::conflict(err.to_string()),
            StoreError::Io(_) | StoreError::Serialization(_) | StoreError::Database(_) => {
                AppError::internal(err.to_string())
            }
        }
    }
}
