//! Transparency Log (C13): append-only publications grouped into batches,
//! each chained to the previous batch's root hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use swapgraph_core::canonical::sha256_canonical_value;

use crate::merkle::merkle_root;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationBatch {
    pub publication_id: String,
    pub publication_index: u64,
    pub source_type: String,
    pub entries: Vec<Value>,
    pub root_hash: String,
    pub previous_root_hash: Option<String>,
    pub chain_hash: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransparencyLog {
    batches: Vec<PublicationBatch>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[PublicationBatch] {
        &self.batches
    }

    pub fn last_root_hash(&self) -> Option<&str> {
        self.batches.last().map(|b| b.root_hash.as_str())
    }

    /// Append a batch of entries as the next publication. The caller is
    /// responsible for idempotency-key deduplication of "same logical batch,
    /// same content" replays before calling this.
    pub fn append_batch(
        &mut self,
        publication_id: impl Into<String>,
        source_type: impl Into<String>,
        entries: Vec<Value>,
        published_at: DateTime<Utc>,
    ) -> &PublicationBatch {
        let publication_index = self.batches.len() as u64;
        let leaf_hashes: Vec<String> = entries.iter().map(sha256_canonical_value).collect();
        let root_hash = merkle_root(&leaf_hashes);
        let previous_root_hash = self.batches.last().map(|b| b.root_hash.clone());
        let chain_hash = sha256_canonical_value(&serde_json::json!({
            "previous_root_hash": previous_root_hash,
            "root_hash": root_hash,
        }));

        self.batches.push(PublicationBatch {
            publication_id: publication_id.into(),
            publication_index,
            source_type: source_type.into(),
            entries,
            root_hash,
            previous_root_hash,
            chain_hash,
            published_at,
        });
        self.batches.last().expect("just pushed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batches_chain_to_previous_root_hash() {
        let mut log = TransparencyLog::new();
        log.append_batch("pub-1", "receipt", vec![json!({"a": 1})], Utc::now());
        log.append_batch("pub-2", "receipt", vec![json!({"a": 2})], Utc::now());

        assert_eq!(log.batches()[1].previous_root_hash, Some(log.batches()[0].root_hash.clone()));
        assert_eq!(log.batches()[0].publication_index, 0);
        assert_eq!(log.batches()[1].publication_index, 1);
    }

    #[test]
    fn different_entries_produce_different_root_hashes() {
        let mut log = TransparencyLog::new();
        log.append_batch("pub-1", "receipt", vec![json!({"a": 1})], Utc::now());
        log.append_batch("pub-2", "receipt", vec![json!({"a": 2})], Utc::now());
        assert_ne!(log.batches()[0].root_hash, log.batches()[1].root_hash);
    }
}
