use swapgraph_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("delegation token expired")]
    TokenExpired,
    #[error("delegation token signed by an unknown key")]
    TokenUnknownKey,
    #[error("delegation token signature is invalid")]
    TokenSignatureInvalid,
    #[error("required scope not present in delegation")]
    InsufficientScope,
    #[error("operation not in delegation allowlist")]
    OperationNotPermitted,
    #[error("consent proof binding mismatch")]
    ConsentProofMismatch,
    #[error("consent proof signature invalid")]
    ConsentProofSignatureInvalid,
    #[error("consent proof expired")]
    ConsentProofExpired,
    #[error("consent proof nonce already consumed")]
    ConsentProofReplay,
    #[error("consent proof challenge binding mismatch")]
    ConsentProofChallengeMismatch,
    #[error("daily spend cap exceeded")]
    SpendCapExceeded,
    #[error("consent proof required but not supplied")]
    ConsentProofRequired,
}

impl PolicyError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            PolicyError::TokenExpired => "delegation_token_expired",
            PolicyError::TokenUnknownKey => "delegation_token_unknown_key",
            PolicyError::TokenSignatureInvalid => "delegation_token_signature_invalid",
            PolicyError::InsufficientScope => "insufficient_scope",
            PolicyError::OperationNotPermitted => "operation_not_permitted",
            PolicyError::ConsentProofMismatch => "consent_proof_mismatch",
            PolicyError::ConsentProofSignatureInvalid => "consent_proof_signature_invalid",
            PolicyError::ConsentProofExpired => "consent_proof_expired",
            PolicyError::ConsentProofReplay => "consent_proof_replay",
            PolicyError::ConsentProofChallengeMismatch => "consent_proof_challenge_mismatch",
            PolicyError::SpendCapExceeded => "policy_spend_cap_exceeded",
            PolicyError::ConsentProofRequired => "consent_proof_required",
        }
    }
}

impl From<PolicyError> for AppError {
    fn from(err: PolicyError) -> Self {
        let reason = err.reason_code();
        let app_err = match err {
            PolicyError::TokenExpired | PolicyError::ConsentProofExpired => {
                AppError::expired(err.to_string())
            }
            PolicyError::InsufficientScope => AppError::insufficient_scope(err.to_string()),
            PolicyError::OperationNotPermitted => {
                AppError::operation_not_permitted(err.to_string())
            }
            _ => AppError::forbidden(err.to_string()),
        };
        app_err.with_reason(reason)
    }
}
