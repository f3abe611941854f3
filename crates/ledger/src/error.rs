use swapgraph_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("liquidity provider fetch failed after retries: {0}")]
    AdapterExhausted(String),
    #[error("liquidity provider returned a non-retryable error: status {0}")]
    AdapterRejected(u16),
    #[error("response body could not be parsed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::internal(err.to_string())
    }
}
