//! The shared error taxonomy every domain error ultimately maps into.
//!
//! Individual crates define their own `thiserror` enums local to their
//! domain (state-store errors, matcher errors, policy errors, ...); each one
//! implements `Into<AppError>` so exactly one shape crosses the HTTP
//! boundary, per the error-handling design.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    Forbidden,
    InsufficientScope,
    OperationNotPermitted,
    IdempotencyConflict,
    Conflict,
    Expired,
    ExportChainBroken,
    ExportCheckpointExpired,
    Internal,
}

impl ErrorCode {
    /// Validation/authz failures never persist state and are logged at
    /// `WARN`; reservation and state-machine conflicts are audit-logged as
    /// `deny`; `INTERNAL` is the only code allowed to surface from an
    /// uncaught fault and is always `ERROR`.
    pub fn log_level(self) -> tracing::Level {
        use tracing::Level;
        match self {
            ErrorCode::Internal => Level::ERROR,
            ErrorCode::Conflict | ErrorCode::IdempotencyConflict | ErrorCode::Forbidden => {
                Level::WARN
            }
            _ => Level::INFO,
        }
    }
}

/// The one error type that crosses the HTTP boundary.
#[derive(Debug, thiserror::Error, Clone, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            reason_code: None,
            details: Value::Null,
        }
    }

    pub fn with_reason(mut self, reason_code: impl Into<String>) -> Self {
        self.reason_code = Some(reason_code.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn insufficient_scope(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InsufficientScope, message)
    }

    pub fn operation_not_permitted(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::OperationNotPermitted, message)
    }

    pub fn idempotency_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IdempotencyConflict, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn expired(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Expired, message)
    }

    pub fn export_chain_broken(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExportChainBroken, message)
    }

    pub fn export_checkpoint_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExportCheckpointExpired, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn log_level(&self) -> tracing::Level {
        self.code.log_level()
    }

    /// The wire shape from §6: `{error:{code, message, details{reason_code?, ...}}}`.
    pub fn to_response_body(&self) -> Value {
        let mut details = if self.details.is_object() {
            self.details.clone()
        } else {
            serde_json::json!({})
        };
        if let Some(reason_code) = &self.reason_code {
            details["reason_code"] = Value::String(reason_code.clone());
        }
        serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": details,
            }
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::internal(format!("json error: {err}"))
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_body_nests_reason_code_in_details() {
        let err = AppError::conflict("reservation race").with_reason("intent_reserved");
        let body = err.to_response_body();
        assert_eq!(body["error"]["code"], "CONFLICT");
        assert_eq!(body["error"]["details"]["reason_code"], "intent_reserved");
    }

    #[test]
    fn internal_errors_log_at_error_level() {
        assert_eq!(AppError::internal("boom").log_level(), tracing::Level::ERROR);
        assert_eq!(
            AppError::validation("bad").log_level(),
            tracing::Level::INFO
        );
    }
}
