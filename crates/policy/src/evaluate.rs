//! Ties scope enforcement, allowlist checking, consent verification, and
//! spend-cap tracking into the one evaluation every delegated operation
//! runs through, always leaving exactly one audit entry behind.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use swapgraph_core::signing::KeyRegistry;
use swapgraph_core::ActorRef;

use crate::audit::{PolicyAuditLog, PolicyDecision};
use crate::consent::{verify_consent, ConsentProof, ConsentVerificationConfig};
use crate::delegation::Delegation;
use crate::error::PolicyError;
use crate::spend_cap::SpendCapTracker;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyEngineState {
    pub spend_cap: SpendCapTracker,
    pub consumed_nonces: HashSet<String>,
    pub audit_log: PolicyAuditLog,
}

pub struct EvaluationRequest<'a> {
    pub audit_id: String,
    pub operation_id: &'a str,
    pub actor: ActorRef,
    pub required_scopes: &'a [String],
    pub delegation: &'a Delegation,
    pub consent: Option<&'a ConsentProof>,
    pub committed_value_usd: Option<f64>,
    pub now: DateTime<Utc>,
}

/// Evaluate one delegated operation. Always appends exactly one
/// `PolicyAuditEntry`, whether the result is `allow` or `deny`.
pub fn evaluate_operation(
    state: &mut PolicyEngineState,
    req: EvaluationRequest,
    registry: &KeyRegistry,
    consent_config: ConsentVerificationConfig,
) -> Result<(), PolicyError> {
    let result = (|| {
        if !req.delegation.has_scopes(req.required_scopes) {
            return Err(PolicyError::InsufficientScope);
        }
        if !req.delegation.allows_operation(req.operation_id) {
            return Err(PolicyError::OperationNotPermitted);
        }
        if req.delegation.consent_requirements.require_consent {
            let proof = req.consent.ok_or(PolicyError::ConsentProofRequired)?;
            verify_consent(
                proof,
                req.delegation.consent_requirements.require_signature,
                req.delegation.consent_requirements.require_challenge,
                req.operation_id,
                req.now,
                registry,
                &mut state.consumed_nonces,
                consent_config,
            )?;
        }
        if let Some(amount) = req.committed_value_usd {
            state.spend_cap.check_and_record(
                &req.delegation.delegation_id,
                req.delegation.spend_cap_per_day_usd,
                amount,
                req.now,
            )?;
        }
        Ok(())
    })();

    let (decision, reason_code) = match &result {
        Ok(()) => (PolicyDecision::Allow, None),
        Err(e) => (PolicyDecision::Deny, Some(e.reason_code().to_string())),
    };
    tracing::debug!(
        operation_id = req.operation_id,
        delegation_id = %req.delegation.delegation_id,
        decision = ?decision,
        reason_code = reason_code.as_deref(),
        "policy decision"
    );
    state.audit_log.append(
        req.audit_id,
        req.now,
        req.actor,
        req.operation_id,
        decision,
        reason_code,
        json!({ "delegation_id": req.delegation.delegation_id }),
    );

    result
}
