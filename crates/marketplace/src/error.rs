use swapgraph_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("intent is reserved by a live proposal")]
    IntentReserved,
    #[error("partner is not authorized for this cycle")]
    PartnerUnauthorized,
    #[error("reservation or state-machine conflict: {0}")]
    Conflict(String),
    #[error("proposal, delegation, or consent has expired")]
    Expired,
    #[error("deposit window expired")]
    DepositTimeout,
    #[error("settlement execution failed: {0}")]
    ExecutionError(String),
    #[error("cycle was unwound")]
    CycleUnwound,
    #[error("policy evaluation denied the operation: {0}")]
    PolicyDenied(#[from] swapgraph_policy::error::PolicyError),
}

impl MarketplaceError {
    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            MarketplaceError::IntentReserved => Some("intent_reserved"),
            MarketplaceError::PartnerUnauthorized => Some("partner_unauthorized"),
            MarketplaceError::DepositTimeout => Some("deposit_timeout"),
            MarketplaceError::ExecutionError(_) => Some("execution_error"),
            MarketplaceError::CycleUnwound => Some("cycle_unwound"),
            MarketplaceError::PolicyDenied(e) => Some(e.reason_code()),
            _ => None,
        }
    }
}

impl From<MarketplaceError> for AppError {
    fn from(err: MarketplaceError) -> Self {
        if let MarketplaceError::PolicyDenied(policy_err) = err {
            return AppError::from(policy_err);
        }
        let reason = err.reason_code();
        let app_err = match &err {
            MarketplaceError::Validation(msg) => AppError::validation(msg.clone()),
            MarketplaceError::NotFound(msg) => AppError::not_found(msg.clone()),
            MarketplaceError::Forbidden(msg) => AppError::forbidden(msg.clone()),
            MarketplaceError::IntentReserved => AppError::forbidden(err.to_string()),
            MarketplaceError::PartnerUnauthorized => AppError::forbidden(err.to_string()),
            MarketplaceError::Conflict(msg) => AppError::conflict(msg.clone()),
            MarketplaceError::Expired => AppError::expired(err.to_string()),
            MarketplaceError::DepositTimeout => AppError::conflict(err.to_string()),
            MarketplaceError::ExecutionError(msg) => AppError::internal(msg.clone()),
            MarketplaceError::CycleUnwound => AppError::conflict(err.to_string()),
            MarketplaceError::PolicyDenied(_) => unreachable!("handled above"),
        };
        match reason {
            Some(r) => app_err.with_reason(r),
            None => app_err,
        }
    }
}

impl From<swapgraph_store::StoreError> for MarketplaceError {
    fn from(err: swapgraph_store::StoreError) -> Self {
        match err {
            swapgraph_store::StoreError::NotFound => MarketplaceError::NotFound(err.to_string()),
            swapgraph_store::StoreError::Conflict { .. } => {
                MarketplaceError::Conflict(err.to_string())
            }
            other => MarketplaceError::ExecutionError(other.to_string()),
        }
    }
}
