//! Append-only policy-audit log (C11 tail end). Every delegation
//! evaluation, allow or deny, appends one entry; the stream is exported
//! via the C12 signed-export framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use swapgraph_core::ActorRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyDecision {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyAuditEntry {
    pub audit_id: String,
    pub occurred_at: DateTime<Utc>,
    pub actor: ActorRef,
    pub operation_id: String,
    pub decision: PolicyDecision,
    pub reason_code: Option<String>,
    pub details: Value,
    pub sequence_number: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyAuditLog {
    entries: Vec<PolicyAuditEntry>,
}

impl PolicyAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        audit_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
        actor: ActorRef,
        operation_id: impl Into<String>,
        decision: PolicyDecision,
        reason_code: Option<String>,
        details: Value,
    ) -> &PolicyAuditEntry {
        let sequence_number = self.entries.len() as u64 + 1;
        self.entries.push(PolicyAuditEntry {
            audit_id: audit_id.into(),
            occurred_at,
            actor,
            operation_id: operation_id.into(),
            decision,
            reason_code,
            details,
            sequence_number,
        });
        self.entries.last().expect("just pushed")
    }

    pub fn entries(&self) -> &[PolicyAuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sequence_numbers_are_monotonic() {
        let mut log = PolicyAuditLog::new();
        log.append(
            "a1",
            Utc::now(),
            ActorRef::user("u1"),
            "swapIntents.cancel",
            PolicyDecision::Allow,
            None,
            json!({}),
        );
        log.append(
            "a2",
            Utc::now(),
            ActorRef::user("u1"),
            "swapIntents.cancel",
            PolicyDecision::Deny,
            Some("policy_spend_cap_exceeded".to_string()),
            json!({}),
        );
        assert_eq!(log.entries()[0].sequence_number, 1);
        assert_eq!(log.entries()[1].sequence_number, 2);
    }
}
