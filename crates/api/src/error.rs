//! The one error type every handler returns: wraps the shared
//! `swapgraph_core::AppError` taxonomy with the axum `IntoResponse` glue
//! the domain crates don't need to know about.

use axum::{http::StatusCode, response::IntoResponse, Json};
use swapgraph_core::{error::ErrorCode, AppError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<swapgraph_marketplace::MarketplaceError> for ApiError {
    fn from(err: swapgraph_marketplace::MarketplaceError) -> Self {
        ApiError::App(err.into())
    }
}

impl From<swapgraph_store::StoreError> for ApiError {
    fn from(err: swapgraph_store::StoreError) -> Self {
        ApiError::App(AppError::from(err))
    }
}

impl From<swapgraph_policy::error::PolicyError> for ApiError {
    fn from(err: swapgraph_policy::error::PolicyError) -> Self {
        ApiError::App(AppError::from(err))
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::InsufficientScope => StatusCode::FORBIDDEN,
        ErrorCode::OperationNotPermitted => StatusCode::FORBIDDEN,
        ErrorCode::IdempotencyConflict => StatusCode::CONFLICT,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Expired => StatusCode::GONE,
        ErrorCode::ExportChainBroken => StatusCode::CONFLICT,
        ErrorCode::ExportCheckpointExpired => StatusCode::GONE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let app_err = match self {
            ApiError::App(err) => err,
            ApiError::Internal(err) => AppError::internal(err.to_string()),
        };
        match app_err.log_level() {
            tracing::Level::ERROR => tracing::error!(error = %app_err, "request failed"),
            tracing::Level::WARN => tracing::warn!(error = %app_err, "request failed"),
            _ => tracing::info!(error = %app_err, "request failed"),
        }
        (status_for(app_err.code), Json(app_err.to_response_body())).into_response()
    }
}
