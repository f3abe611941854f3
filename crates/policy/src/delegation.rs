//! Delegation tokens: a compact, signed authority an owner actor grants a
//! subject actor, scoped to a set of scopes and an operation allowlist.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swapgraph_core::signing::{DetachedSignature, KeyRegistry};
use swapgraph_core::ActorRef;

use crate::error::PolicyError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRequirements {
    pub require_consent: bool,
    pub require_signature: bool,
    pub require_challenge: bool,
}

impl Default for ConsentRequirements {
    fn default() -> Self {
        Self {
            require_consent: false,
            require_signature: false,
            require_challenge: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delegation {
    pub delegation_id: String,
    pub owner_actor: ActorRef,
    pub subject_actor: ActorRef,
    pub scopes: Vec<String>,
    pub operation_allowlist: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub spend_cap_per_day_usd: Option<f64>,
    pub consent_requirements: ConsentRequirements,
}

impl Delegation {
    pub fn has_scopes(&self, required: &[String]) -> bool {
        let granted: HashSet<&str> = self.scopes.iter().map(String::as_str).collect();
        required.iter().all(|s| granted.contains(s.as_str()))
    }

    pub fn allows_operation(&self, operation_id: &str) -> bool {
        self.operation_allowlist.iter().any(|op| op == operation_id)
    }
}

/// The bound token carried on the wire: `{delegation, issued_at, expires_at,
/// nonce, signature}`, signed over everything but the signature itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationToken {
    pub delegation: Delegation,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub nonce: String,
    pub signature: DetachedSignature,
}

#[derive(Serialize)]
struct SignablePayload<'a> {
    delegation: &'a Delegation,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    nonce: &'a str,
}

pub fn mint_delegation_token(
    delegation: Delegation,
    nonce: impl Into<String>,
    now: DateTime<Utc>,
    registry: &KeyRegistry,
) -> Result<DelegationToken, PolicyError> {
    let nonce = nonce.into();
    let expires_at = delegation.expires_at;
    let signable = SignablePayload {
        delegation: &delegation,
        issued_at: now,
        expires_at,
        nonce: &nonce,
    };
    let signature = registry
        .sign(&signable)
        .map_err(|_| PolicyError::TokenSignatureInvalid)?;
    Ok(DelegationToken {
        delegation,
        issued_at: now,
        expires_at,
        nonce,
        signature,
    })
}

/// Parse and verify a bound token: rejects expired, unknown-key, or
/// signature-invalid tokens before the caller ever sees the delegation.
pub fn parse_delegation_token(
    token: &DelegationToken,
    now: DateTime<Utc>,
    registry: &KeyRegistry,
) -> Result<Delegation, PolicyError> {
    if now > token.expires_at {
        return Err(PolicyError::TokenExpired);
    }
    if registry.verifying_key(&token.signature.key_id).is_none() {
        return Err(PolicyError::TokenUnknownKey);
    }
    let signable = SignablePayload {
        delegation: &token.delegation,
        issued_at: token.issued_at,
        expires_at: token.expires_at,
        nonce: &token.nonce,
    };
    let ok = registry
        .verify_self_contained(&signable, &token.signature)
        .map_err(|_| PolicyError::TokenSignatureInvalid)?;
    if !ok {
        return Err(PolicyError::TokenSignatureInvalid);
    }
    Ok(token.delegation.clone())
}
