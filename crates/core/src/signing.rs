//! Detached Ed25519 signatures over canonical JSON bytes.
//!
//! Two verification paths are supported, per C1: a self-contained
//! trust-on-first-use path that resolves `key_id` against an in-process
//! registry, and an authoritative path where the caller supplies the
//! verifying key directly (e.g. from a PEM-distributed public key).

use std::collections::HashMap;

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _};
pub use ed25519_dalek::VerifyingKey;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::canonical_stringify;

pub const ALG_ED25519: &str = "ed25519";

/// A detached signature attached alongside the payload it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachedSignature {
    pub alg: String,
    pub key_id: String,
    pub sig: String,
}

/// Holds signing (private) and verifying (public) keys by `key_id`.
///
/// The server process holds one active signing key and retains retired
/// verifying keys so older signatures keep verifying.
#[derive(Default)]
pub struct KeyRegistry {
    signing: HashMap<String, SigningKey>,
    verifying: HashMap<String, VerifyingKey>,
    active_key_id: Option<String>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh key pair, register it, and mark it active.
    pub fn generate_active(&mut self, key_id: impl Into<String>) -> String {
        let key_id = key_id.into();
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        self.verifying.insert(key_id.clone(), verifying_key);
        self.signing.insert(key_id.clone(), signing_key);
        self.active_key_id = Some(key_id.clone());
        key_id
    }

    /// Register a verifying-only key (e.g. a retired key kept for replay
    /// verification, or one published by a counterparty).
    pub fn add_verifying_key(&mut self, key_id: impl Into<String>, key: VerifyingKey) {
        self.verifying.insert(key_id.into(), key);
    }

    pub fn active_key_id(&self) -> Option<&str> {
        self.active_key_id.as_deref()
    }

    /// `key-set list`: the public identifiers of every key this registry can
    /// verify against. Never exposes signing material.
    pub fn key_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.verifying.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn verifying_key(&self, key_id: &str) -> Option<&VerifyingKey> {
        self.verifying.get(key_id)
    }

    /// Sign the canonical bytes of `value` with the active key.
    pub fn sign<T: Serialize>(&self, value: &T) -> Result<DetachedSignature, SigningError> {
        let key_id = self
            .active_key_id
            .as_ref()
            .ok_or(SigningError::NoActiveKey)?;
        let signing_key = self.signing.get(key_id).ok_or(SigningError::NoActiveKey)?;
        let bytes = canonical_stringify(&serde_json::to_value(value)?);
        let signature = signing_key.sign(&bytes);
        Ok(DetachedSignature {
            alg: ALG_ED25519.to_string(),
            key_id: key_id.clone(),
            sig: hex::encode(signature.to_bytes()),
        })
    }

    /// Self-contained (trust-on-first-use) verification: resolves
    /// `sig.key_id` against this registry's own verifying keys.
    pub fn verify_self_contained<T: Serialize>(
        &self,
        value: &T,
        sig: &DetachedSignature,
    ) -> Result<bool, SigningError> {
        let verifying_key = self
            .verifying
            .get(&sig.key_id)
            .ok_or(SigningError::UnknownKey)?;
        verify_with_key(verifying_key, value, sig)
    }
}

/// Authoritative verification: the caller supplies the verifying key,
/// overriding whatever `key_id` the signature claims.
pub fn verify_with_key<T: Serialize>(
    verifying_key: &VerifyingKey,
    value: &T,
    sig: &DetachedSignature,
) -> Result<bool, SigningError> {
    if sig.alg != ALG_ED25519 {
        return Err(SigningError::UnsupportedAlg(sig.alg.clone()));
    }
    let bytes = canonical_stringify(&serde_json::to_value(value)?);
    let raw = hex::decode(&sig.sig).map_err(|_| SigningError::MalformedSignature)?;
    let signature =
        Signature::from_slice(&raw).map_err(|_| SigningError::MalformedSignature)?;
    Ok(verifying_key.verify(&bytes, &signature).is_ok())
}

/// Verify a signature over an already-canonicalized `Value`, used by the
/// export framework where the signable payload is assembled by hand.
pub fn verify_value_with_key(
    verifying_key: &VerifyingKey,
    value: &Value,
    sig: &DetachedSignature,
) -> Result<bool, SigningError> {
    if sig.alg != ALG_ED25519 {
        return Err(SigningError::UnsupportedAlg(sig.alg.clone()));
    }
    let bytes = canonical_stringify(value);
    let raw = hex::decode(&sig.sig).map_err(|_| SigningError::MalformedSignature)?;
    let signature =
        Signature::from_slice(&raw).map_err(|_| SigningError::MalformedSignature)?;
    Ok(verifying_key.verify(&bytes, &signature).is_ok())
}

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("no active signing key configured")]
    NoActiveKey,
    #[error("unknown key id")]
    UnknownKey,
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("malformed signature encoding")]
    MalformedSignature,
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
