//! Minimal binary Merkle tree over pre-hashed leaves, shared by the
//! transparency log (C13, root over entry hashes) and liquidity inventory
//! snapshots (C14, root over per-holding leaf hashes plus inclusion
//! proofs).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    pub leaf_index: usize,
    pub siblings: Vec<ProofStep>,
}

fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

/// Root over `leaves` (already-hex-encoded leaf hashes). Odd levels
/// duplicate the last node, the common Merkle-tree convention.
pub fn merkle_root(leaves: &[String]) -> String {
    if leaves.is_empty() {
        return hex::encode(Sha256::digest(b""));
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for chunk in level.chunks(2) {
            let (left, right) = match chunk {
                [a, b] => (a.as_str(), b.as_str()),
                [a] => (a.as_str(), a.as_str()),
                _ => unreachable!(),
            };
            next.push(hash_pair(left, right));
        }
        level = next;
    }
    level.into_iter().next().expect("non-empty level")
}

/// Build the sibling path proving `leaves[leaf_index]` is included under
/// `merkle_root(leaves)`.
pub fn build_inclusion_proof(leaves: &[String], leaf_index: usize) -> InclusionProof {
    let mut idx = leaf_index;
    let mut level = leaves.to_vec();
    let mut siblings = Vec::new();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for (pair_idx, chunk) in level.chunks(2).enumerate() {
            let (left, right) = match chunk {
                [a, b] => (a.clone(), b.clone()),
                [a] => (a.clone(), a.clone()),
                _ => unreachable!(),
            };
            if pair_idx == idx / 2 {
                if idx % 2 == 0 {
                    siblings.push(ProofStep {
                        sibling: right.clone(),
                        position: Position::Right,
                    });
                } else {
                    siblings.push(ProofStep {
                        sibling: left.clone(),
                        position: Position::Left,
                    });
                }
            }
            next.push(hash_pair(&left, &right));
        }
        idx /= 2;
        level = next;
    }

    InclusionProof {
        leaf_index,
        siblings,
    }
}

/// Recompute the root from `leaf_hash` and `proof.siblings`; the caller
/// compares the result against the snapshot's recorded `root_hash`.
pub fn verify_inclusion_proof(leaf_hash: &str, proof: &InclusionProof, root_hash: &str) -> bool {
    let mut current = leaf_hash.to_string();
    for step in &proof.siblings {
        current = match step.position {
            Position::Left => hash_pair(&step.sibling, &current),
            Position::Right => hash_pair(&current, &step.sibling),
        };
    }
    current == root_hash
}
