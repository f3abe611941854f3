//! ConsentProof binding, signature, and challenge verification.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swapgraph_core::canonical::sha256_canonical_value;
use swapgraph_core::signing::KeyRegistry;
use swapgraph_core::ActorRef;

use crate::error::PolicyError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentProof {
    pub consent_id: String,
    pub subject_actor: ActorRef,
    pub delegation_id: String,
    pub intent: serde_json::Value,
    pub binding: String,
    pub signature: Option<swapgraph_core::signing::DetachedSignature>,
    pub expires_at: Option<DateTime<Utc>>,
    pub nonce: String,
    pub challenge_id: Option<String>,
    pub challenge_binding: Option<String>,
}

impl ConsentProof {
    pub fn expected_binding(&self) -> String {
        sha256_canonical_value(&serde_json::json!({
            "consent_id": self.consent_id,
            "subject_actor": self.subject_actor,
            "delegation_id": self.delegation_id,
            "intent": self.intent,
        }))
    }

    pub fn expected_challenge_binding(&self, operation_id: &str) -> String {
        sha256_canonical_value(&serde_json::json!({
            "consent_id": self.consent_id,
            "subject_actor": self.subject_actor,
            "delegation_id": self.delegation_id,
            "intent": self.intent,
            "operation_id": operation_id,
        }))
    }
}

/// Allows an already-signed raw consent proof (no `require_signature`
/// re-check against the active key set) for deployments that still accept
/// the legacy `signed_raw` mode. Disabled by default; flip on via config.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsentVerificationConfig {
    pub signed_raw_allowed: bool,
}

/// Verify binding, signature (if required), and challenge (if required);
/// marks `nonce` consumed in `consumed_nonces` only after every check
/// passes.
pub fn verify_consent(
    proof: &ConsentProof,
    require_signature: bool,
    require_challenge: bool,
    operation_id: &str,
    now: DateTime<Utc>,
    registry: &KeyRegistry,
    consumed_nonces: &mut HashSet<String>,
    config: ConsentVerificationConfig,
) -> Result<(), PolicyError> {
    if proof.binding != proof.expected_binding() {
        return Err(PolicyError::ConsentProofMismatch);
    }

    if let Some(expires_at) = proof.expires_at {
        if now > expires_at {
            return Err(PolicyError::ConsentProofExpired);
        }
    }

    if require_signature && !(config.signed_raw_allowed && proof.signature.is_none()) {
        let sig = proof
            .signature
            .as_ref()
            .ok_or(PolicyError::ConsentProofSignatureInvalid)?;
        let ok = registry
            .verify_self_contained(&proof.binding, sig)
            .map_err(|_| PolicyError::ConsentProofSignatureInvalid)?;
        if !ok {
            return Err(PolicyError::ConsentProofSignatureInvalid);
        }
    }

    if require_challenge {
        let expected = proof.expected_challenge_binding(operation_id);
        match &proof.challenge_binding {
            Some(binding) if *binding == expected => {}
            _ => return Err(PolicyError::ConsentProofChallengeMismatch),
        }
    }

    if consumed_nonces.contains(&proof.nonce) {
        return Err(PolicyError::ConsentProofReplay);
    }
    consumed_nonces.insert(proof.nonce.clone());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_proof() -> ConsentProof {
        let subject_actor = ActorRef::user("u1");
        let intent = json!({"offer": "asset_a"});
        let mut proof = ConsentProof {
            consent_id: "c1".to_string(),
            subject_actor,
            delegation_id: "del-1".to_string(),
            intent,
            binding: String::new(),
            signature: None,
            expires_at: None,
            nonce: "nonce-1".to_string(),
            challenge_id: None,
            challenge_binding: None,
        };
        proof.binding = proof.expected_binding();
        proof
    }

    #[test]
    fn binding_mismatch_is_rejected() {
        let mut proof = base_proof();
        proof.binding = "wrong".to_string();
        let registry = KeyRegistry::new();
        let mut nonces = HashSet::new();
        let err = verify_consent(
            &proof,
            false,
            false,
            "swapIntents.cancel",
            Utc::now(),
            &registry,
            &mut nonces,
            ConsentVerificationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::ConsentProofMismatch));
    }

    #[test]
    fn replay_of_same_nonce_is_rejected() {
        let proof = base_proof();
        let registry = KeyRegistry::new();
        let mut nonces = HashSet::new();
        verify_consent(
            &proof,
            false,
            false,
            "swapIntents.cancel",
            Utc::now(),
            &registry,
            &mut nonces,
            ConsentVerificationConfig::default(),
        )
        .unwrap();
        let err = verify_consent(
            &proof,
            false,
            false,
            "swapIntents.cancel",
            Utc::now(),
            &registry,
            &mut nonces,
            ConsentVerificationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::ConsentProofReplay));
    }

    #[test]
    fn challenge_mismatch_is_rejected_when_required() {
        let proof = base_proof();
        let registry = KeyRegistry::new();
        let mut nonces = HashSet::new();
        let err = verify_consent(
            &proof,
            false,
            true,
            "swapIntents.cancel",
            Utc::now(),
            &registry,
            &mut nonces,
            ConsentVerificationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::ConsentProofChallengeMismatch));
    }

    #[test]
    fn signed_raw_flag_permits_missing_signature() {
        let proof = base_proof();
        let registry = KeyRegistry::new();
        let mut nonces = HashSet::new();
        let config = ConsentVerificationConfig {
            signed_raw_allowed: true,
        };
        verify_consent(
            &proof,
            true,
            false,
            "swapIntents.cancel",
            Utc::now(),
            &registry,
            &mut nonces,
            config,
        )
        .unwrap();
    }

    #[test]
    fn missing_signature_rejected_without_signed_raw_flag() {
        let proof = base_proof();
        let registry = KeyRegistry::new();
        let mut nonces = HashSet::new();
        let err = verify_consent(
            &proof,
            true,
            false,
            "swapIntents.cancel",
            Utc::now(),
            &registry,
            &mut nonces,
            ConsentVerificationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::ConsentProofSignatureInvalid));
    }
}
