//! Event Outbox (C4): an append-only, deduplicated list of envelopes with
//! deterministic ids and a checkpointed-fold replay contract.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use swapgraph_core::{canonical::sha256_canonical_value, ActorRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub actor: ActorRef,
    pub correlation_id: String,
    pub payload: Value,
}

/// Deterministic id derived from the operation's logical effect rather than
/// randomness, so appending the same logical event twice (e.g. across a
/// retried write) is a no-op.
pub fn derive_event_id(event_type: &str, correlation_id: &str, payload: &Value) -> String {
    sha256_canonical_value(&serde_json::json!({
        "type": event_type,
        "correlation_id": correlation_id,
        "payload": payload,
    }))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventOutbox {
    entries: Vec<EventEnvelope>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl EventOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the dedup index after deserializing from storage.
    pub fn rehydrate(&mut self) {
        self.seen = self.entries.iter().map(|e| e.event_id.clone()).collect();
    }

    /// Append an envelope, deduplicating by `event_id`. Returns `true` if
    /// this was a new event, `false` if it was already present (replay
    /// no-op).
    pub fn append(&mut self, envelope: EventEnvelope) -> bool {
        if self.seen.contains(&envelope.event_id) {
            return false;
        }
        self.seen.insert(envelope.event_id.clone());
        self.entries.push(envelope);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[EventEnvelope] {
        &self.entries
    }

    /// One canonical-JSON envelope per line, in append order.
    pub fn ndjson_dump(&self) -> String {
        self.entries
            .iter()
            .map(|e| serde_json::to_string(e).expect("envelope always serializes"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Fold the full log from the beginning.
    pub fn fold<A>(&self, init: A, mut f: impl FnMut(A, &EventEnvelope) -> A) -> A {
        self.entries.iter().fold(init, |acc, e| f(acc, e))
    }

    /// Fold the log starting immediately after `checkpoint_event_id`
    /// (`None` means "from the beginning"). Used by checkpointed consumers
    /// to resume without reprocessing.
    pub fn fold_from<A>(
        &self,
        checkpoint_event_id: Option<&str>,
        init: A,
        mut f: impl FnMut(A, &EventEnvelope) -> A,
    ) -> A {
        let start = match checkpoint_event_id {
            None => 0,
            Some(id) => self
                .entries
                .iter()
                .position(|e| e.event_id == id)
                .map(|i| i + 1)
                .unwrap_or(self.entries.len()),
        };
        self.entries[start..].iter().fold(init, |acc, e| f(acc, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(id_seed: &str) -> EventEnvelope {
        let payload = json!({"seed": id_seed});
        EventEnvelope {
            event_id: derive_event_id("test.event", "corr-1", &payload),
            event_type: "test.event".to_string(),
            occurred_at: Utc::now(),
            actor: ActorRef::user("u1"),
            correlation_id: "corr-1".to_string(),
            payload,
        }
    }

    #[test]
    fn append_dedupes_by_event_id() {
        let mut outbox = EventOutbox::new();
        assert!(outbox.append(envelope("a")));
        assert!(!outbox.append(envelope("a")));
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn replay_equals_full_fold() {
        let mut outbox = EventOutbox::new();
        outbox.append(envelope("a"));
        outbox.append(envelope("b"));
        outbox.append(envelope("c"));

        let checkpoint = outbox.entries()[0].event_id.clone();

        let before: Vec<String> = outbox.fold(Vec::new(), |mut acc, e| {
            acc.push(e.event_id.clone());
            acc
        });
        let prefix: Vec<String> = outbox.fold_from(None, Vec::new(), |mut acc, e| {
            if e.event_id == checkpoint {
                acc.push(e.event_id.clone());
            }
            acc
        });
        let suffix: Vec<String> = outbox.fold_from(Some(&checkpoint), Vec::new(), |mut acc, e| {
            acc.push(e.event_id.clone());
            acc
        });

        let mut replay = prefix;
        replay.extend(suffix);
        assert_eq!(replay, before);
    }

    #[test]
    fn event_id_is_deterministic_for_same_logical_effect() {
        let a = derive_event_id("proposal.committed", "p1", &json!({"x": 1}));
        let b = derive_event_id("proposal.committed", "p1", &json!({"x": 1}));
        assert_eq!(a, b);
    }
}
