//! Idempotency Ledger (C3): a per-scope record of `(idempotency_key ->
//! request_fingerprint, result)` so a retried request with the same key and
//! body replays its stored result, and a retried request with the same key
//! but a different body is rejected as a conflict.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use swapgraph_core::canonical::sha256_canonical_value;

/// Identifies the logical operation an idempotency key is scoped to, so the
/// same key string used for two different endpoints never collides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub scope: String,
    pub idempotency_key: String,
}

impl ScopeKey {
    pub fn new(scope: impl Into<String>, idempotency_key: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            idempotency_key: idempotency_key.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub request_fingerprint: String,
    pub result_status: u16,
    pub result_body: Value,
    pub recorded_at: DateTime<Utc>,
}

pub enum IdempotencyOutcome {
    /// No record existed for this key; the caller should execute the
    /// operation and then call `record`.
    Fresh,
    /// A record existed with a matching fingerprint; replay its result
    /// verbatim instead of re-executing.
    Replay(IdempotencyRecord),
    /// A record existed under this key with a different request body.
    Conflict,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdempotencyLedger {
    records: HashMap<ScopeKey, IdempotencyRecord>,
}

impl IdempotencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fingerprint(request_body: &Value) -> String {
        sha256_canonical_value(request_body)
    }

    /// Check a key against an inbound request fingerprint before the
    /// operation runs.
    pub fn check(&self, key: &ScopeKey, request_fingerprint: &str) -> IdempotencyOutcome {
        match self.records.get(key) {
            None => IdempotencyOutcome::Fresh,
            Some(record) if record.request_fingerprint == request_fingerprint => {
                IdempotencyOutcome::Replay(record.clone())
            }
            Some(_) => IdempotencyOutcome::Conflict,
        }
    }

    /// Persist the outcome of a freshly executed operation under `key`.
    pub fn record(
        &mut self,
        key: ScopeKey,
        request_fingerprint: String,
        result_status: u16,
        result_body: Value,
        recorded_at: DateTime<Utc>,
    ) {
        self.records.insert(
            key,
            IdempotencyRecord {
                request_fingerprint,
                result_status,
                result_body,
                recorded_at,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fresh_key_then_replay_on_matching_fingerprint() {
        let mut ledger = IdempotencyLedger::new();
        let key = ScopeKey::new("commit.create", "idem-1");
        let body = json!({"proposal_id": "p1"});
        let fp = IdempotencyLedger::fingerprint(&body);

        assert!(matches!(ledger.check(&key, &fp), IdempotencyOutcome::Fresh));
        ledger.record(key.clone(), fp.clone(), 200, json!({"ok": true}), Utc::now());

        match ledger.check(&key, &fp) {
            IdempotencyOutcome::Replay(record) => assert_eq!(record.result_status, 200),
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn same_key_different_body_is_conflict() {
        let mut ledger = IdempotencyLedger::new();
        let key = ScopeKey::new("commit.create", "idem-1");
        let body_a = json!({"proposal_id": "p1"});
        let body_b = json!({"proposal_id": "p2"});
        let fp_a = IdempotencyLedger::fingerprint(&body_a);
        let fp_b = IdempotencyLedger::fingerprint(&body_b);

        ledger.record(key.clone(), fp_a, 200, json!({"ok": true}), Utc::now());
        assert!(matches!(
            ledger.check(&key, &fp_b),
            IdempotencyOutcome::Conflict
        ));
    }
}
