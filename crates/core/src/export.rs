//! Signed Export Framework (C12), reused by the policy-audit export,
//! the transparency-log export, and the liquidity reconciliation export.
//!
//! Generic over the entry type: callers filter and order their own
//! `entries[]`, then hand them here to get a chained, checkpointed, signed
//! page back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::sha256_canonical_value;
use crate::error::AppError;
use crate::signing::{DetachedSignature, KeyRegistry, VerifyingKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub attestation_after: Option<String>,
    pub chain_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_after: Option<String>,
    pub checkpoint_hash: String,
    pub next_cursor: Option<String>,
}

/// A previously issued checkpoint for one export stream, retained so the
/// next page's continuity claims can be validated against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportCheckpointRecord {
    pub checkpoint_hash: String,
    pub next_cursor: Option<String>,
    pub attestation_chain_hash: String,
    pub exported_at: DateTime<Utc>,
}

impl ExportCheckpointRecord {
    pub fn is_expired(&self, now: DateTime<Utc>, retention_ttl: chrono::Duration) -> bool {
        now - self.exported_at > retention_ttl
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedExport<E> {
    pub entries: Vec<E>,
    pub total_filtered: usize,
    pub next_cursor: Option<String>,
    pub export_hash: String,
    pub attestation: Attestation,
    pub checkpoint: Checkpoint,
    pub signature: DetachedSignature,
}

/// Claims the caller makes about the previous page, carried on the request
/// for page N (N > 0). Absent for the first page of a stream.
#[derive(Debug, Clone, Default)]
pub struct ContinuationClaim {
    pub attestation_after: Option<String>,
    pub checkpoint_after: Option<String>,
}

/// Build and sign the next page of an export stream.
///
/// `prev` is the stream's last retained checkpoint, if any. Returns the
/// signed page plus the new checkpoint record the caller should persist.
pub fn build_signed_export<E: Serialize + Clone>(
    entries: Vec<E>,
    total_filtered: usize,
    next_cursor: Option<String>,
    filters: Value,
    prev: Option<&ExportCheckpointRecord>,
    claim: &ContinuationClaim,
    now: DateTime<Utc>,
    retention_ttl: chrono::Duration,
    registry: &KeyRegistry,
) -> Result<(SignedExport<E>, ExportCheckpointRecord), AppError> {
    match prev {
        Some(record) => {
            if record.is_expired(now, retention_ttl) {
                return Err(AppError::export_checkpoint_expired(
                    "export checkpoint past retention window",
                ));
            }
            if claim.attestation_after.as_deref() != Some(record.attestation_chain_hash.as_str())
                || claim.checkpoint_after.as_deref() != Some(record.checkpoint_hash.as_str())
            {
                return Err(AppError::export_chain_broken(
                    "attestation_after/checkpoint_after does not match the previous page",
                ));
            }
        }
        None => {
            if claim.attestation_after.is_some() || claim.checkpoint_after.is_some() {
                return Err(AppError::export_chain_broken(
                    "continuation claims supplied for the first page of a stream",
                ));
            }
        }
    }

    let export_hash = sha256_canonical_value(&serde_json::json!({
        "entries": entries,
        "filters": filters,
        "total_filtered": total_filtered,
    }));

    let prev_chain_hash = prev.map(|r| r.attestation_chain_hash.clone());
    let chain_hash = sha256_canonical_value(&serde_json::json!({
        "prev_chain_hash": prev_chain_hash,
        "export_hash": export_hash,
    }));

    let attestation = Attestation {
        attestation_after: prev.map(|r| r.attestation_chain_hash.clone()),
        chain_hash: chain_hash.clone(),
    };

    let checkpoint_hash = sha256_canonical_value(&serde_json::json!({
        "export_hash": export_hash,
        "next_cursor": next_cursor,
        "chain_hash": chain_hash,
    }));

    let checkpoint = Checkpoint {
        checkpoint_after: prev.map(|r| r.checkpoint_hash.clone()),
        checkpoint_hash: checkpoint_hash.clone(),
        next_cursor: next_cursor.clone(),
    };

    let signable = serde_json::json!({
        "entries": entries,
        "total_filtered": total_filtered,
        "next_cursor": next_cursor,
        "export_hash": export_hash,
        "attestation": attestation,
        "checkpoint": checkpoint,
    });
    let signature = registry
        .sign(&signable)
        .map_err(|e| AppError::internal(format!("export signing failed: {e}")))?;

    let record = ExportCheckpointRecord {
        checkpoint_hash,
        next_cursor: next_cursor.clone(),
        attestation_chain_hash: chain_hash,
        exported_at: now,
    };

    let page = SignedExport {
        entries,
        total_filtered,
        next_cursor,
        export_hash,
        attestation,
        checkpoint,
        signature,
    };

    Ok((page, record))
}

/// Verify a signed export page against an authoritative verifying key.
/// Any single-byte mutation of `entries`, `export_hash`, or
/// `attestation.chain_hash` is expected to make this return `false`.
pub fn verify_signed_export<E: Serialize + Clone>(
    page: &SignedExport<E>,
    verifying_key: &VerifyingKey,
) -> Result<bool, AppError> {
    let signable = serde_json::json!({
        "entries": page.entries,
        "total_filtered": page.total_filtered,
        "next_cursor": page.next_cursor,
        "export_hash": page.export_hash,
        "attestation": page.attestation,
        "checkpoint": page.checkpoint,
    });
    crate::signing::verify_value_with_key(verifying_key, &signable, &page.signature)
        .map_err(|e| AppError::internal(format!("export verification failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::KeyRegistry;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn first_page_requires_no_continuation_claims() {
        let mut registry = KeyRegistry::new();
        registry.generate_active("k1");
        let result = build_signed_export(
            vec![json!({"a": 1})],
            1,
            None,
            json!({}),
            None,
            &ContinuationClaim::default(),
            now(),
            chrono::Duration::days(30),
            &registry,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn chain_continuity_enforced_between_pages() {
        let mut registry = KeyRegistry::new();
        registry.generate_active("k1");
        let (_page1, record1) = build_signed_export(
            vec![json!({"a": 1})],
            2,
            Some("cursor-1".to_string()),
            json!({}),
            None,
            &ContinuationClaim::default(),
            now(),
            chrono::Duration::days(30),
            &registry,
        )
        .unwrap();

        // Correct continuation succeeds.
        let good_claim = ContinuationClaim {
            attestation_after: Some(record1.attestation_chain_hash.clone()),
            checkpoint_after: Some(record1.checkpoint_hash.clone()),
        };
        assert!(build_signed_export(
            vec![json!({"a": 2})],
            2,
            None,
            json!({}),
            Some(&record1),
            &good_claim,
            now(),
            chrono::Duration::days(30),
            &registry,
        )
        .is_ok());

        // A flipped last byte of the chain hash breaks continuity.
        let mut tampered_hash = record1.attestation_chain_hash.clone();
        let last = tampered_hash.pop().unwrap();
        tampered_hash.push(if last == '0' { '1' } else { '0' });
        let bad_claim = ContinuationClaim {
            attestation_after: Some(tampered_hash),
            checkpoint_after: Some(record1.checkpoint_hash.clone()),
        };
        let err = build_signed_export(
            vec![json!({"a": 2})],
            2,
            None,
            json!({}),
            Some(&record1),
            &bad_claim,
            now(),
            chrono::Duration::days(30),
            &registry,
        )
        .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ExportChainBroken);
    }

    #[test]
    fn expired_checkpoint_rejected() {
        let mut registry = KeyRegistry::new();
        registry.generate_active("k1");
        let (_page, record) = build_signed_export(
            vec![json!({"a": 1})],
            1,
            None,
            json!({}),
            None,
            &ContinuationClaim::default(),
            now(),
            chrono::Duration::days(1),
            &registry,
        )
        .unwrap();

        let claim = ContinuationClaim {
            attestation_after: Some(record.attestation_chain_hash.clone()),
            checkpoint_after: Some(record.checkpoint_hash.clone()),
        };
        let later = now() + chrono::Duration::days(2);
        let err = build_signed_export(
            vec![json!({"a": 2})],
            1,
            None,
            json!({}),
            Some(&record),
            &claim,
            later,
            chrono::Duration::days(1),
            &registry,
        )
        .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ExportCheckpointExpired);
    }

    #[test]
    fn verification_detects_single_byte_tamper() {
        let mut registry = KeyRegistry::new();
        registry.generate_active("k1");
        let (page, _record) = build_signed_export(
            vec![json!({"amount": 10})],
            1,
            None,
            json!({}),
            None,
            &ContinuationClaim::default(),
            now(),
            chrono::Duration::days(30),
            &registry,
        )
        .unwrap();

        let verifying_key = registry.verifying_key("k1").unwrap();
        assert!(verify_signed_export(&page, verifying_key).unwrap());

        let mut tampered = page.clone();
        tampered.entries = vec![json!({"amount": 11})];
        assert!(!verify_signed_export(&tampered, verifying_key).unwrap());

        let mut tampered_hash = page.clone();
        tampered_hash.attestation.chain_hash.push('0');
        assert!(!verify_signed_export(&tampered_hash, verifying_key).unwrap());
    }
}
