//! Liquidity & Reconciliation (C14): providers, personas, inventory
//! snapshots with Merkle inclusion proofs, and batched reserve/release
//! operations over provider-held holdings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merkle::{self, InclusionProof};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub provider_id: String,
    pub version: u64,
    pub name: String,
    pub status: ProviderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub persona_id: String,
    pub provider_id: String,
    pub version: u64,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingStatus {
    Available,
    Reserved,
    NotAvailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub holding_id: String,
    pub provider_id: String,
    pub asset_id: String,
    pub amount_usd: f64,
    pub status: HoldingStatus,
    pub reservation_id: Option<String>,
    pub context_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReserveOutcome {
    Success,
    Conflict,
    NotAvailable,
    ContextMismatch,
    AssetNotFound,
}

pub struct ReserveRequest {
    pub holding_id: String,
    pub reservation_id: String,
    pub context_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiquidityRegistry {
    providers: HashMap<String, Provider>,
    personas: HashMap<String, Persona>,
    holdings: HashMap<String, Holding>,
}

impl LiquidityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or re-register a provider; re-registration bumps its
    /// version rather than overwriting history.
    pub fn upsert_provider(&mut self, provider_id: impl Into<String>, name: impl Into<String>, status: ProviderStatus) -> &Provider {
        let provider_id = provider_id.into();
        let version = self
            .providers
            .get(&provider_id)
            .map(|p| p.version + 1)
            .unwrap_or(1);
        self.providers.insert(
            provider_id.clone(),
            Provider {
                provider_id: provider_id.clone(),
                version,
                name: name.into(),
                status,
            },
        );
        self.providers.get(&provider_id).expect("just inserted")
    }

    pub fn upsert_persona(&mut self, persona_id: impl Into<String>, provider_id: impl Into<String>, scopes: Vec<String>) -> &Persona {
        let persona_id = persona_id.into();
        let version = self
            .personas
            .get(&persona_id)
            .map(|p| p.version + 1)
            .unwrap_or(1);
        self.personas.insert(
            persona_id.clone(),
            Persona {
                persona_id: persona_id.clone(),
                provider_id: provider_id.into(),
                version,
                scopes,
            },
        );
        self.personas.get(&persona_id).expect("just inserted")
    }

    pub fn provider(&self, provider_id: &str) -> Option<&Provider> {
        self.providers.get(provider_id)
    }

    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn holding_count(&self) -> usize {
        self.holdings.len()
    }

    pub fn persona(&self, persona_id: &str) -> Option<&Persona> {
        self.personas.get(persona_id)
    }

    pub fn upsert_holding(&mut self, holding: Holding) {
        self.holdings.insert(holding.holding_id.clone(), holding);
    }

    pub fn holdings_for_provider(&self, provider_id: &str) -> Vec<&Holding> {
        self.holdings
            .values()
            .filter(|h| h.provider_id == provider_id)
            .collect()
    }

    /// Reserve a batch of holdings, each independently outcome-bearing.
    /// Exclusive: a holding already `reserved` yields `conflict`, not an
    /// error, so sibling entries in the batch still get processed.
    pub fn reserve_batch(&mut self, requests: &[ReserveRequest]) -> Vec<(String, ReserveOutcome)> {
        requests
            .iter()
            .map(|req| {
                let outcome = match self.holdings.get_mut(&req.holding_id) {
                    None => ReserveOutcome::AssetNotFound,
                    Some(holding) => {
                        if let Some(ctx) = &req.context_id {
                            if holding.context_id.as_deref() != Some(ctx.as_str()) {
                                ReserveOutcome::ContextMismatch
                            } else {
                                reserve_one(holding, &req.reservation_id)
                            }
                        } else {
                            reserve_one(holding, &req.reservation_id)
                        }
                    }
                };
                (req.holding_id.clone(), outcome)
            })
            .collect()
    }

    /// Release a batch of holdings back to `available`. Idempotent: an
    /// already-available holding yields `success` without a state change.
    pub fn release_batch(&mut self, holding_ids: &[String]) -> Vec<(String, ReserveOutcome)> {
        holding_ids
            .iter()
            .map(|id| {
                let outcome = match self.holdings.get_mut(id) {
                    None => ReserveOutcome::AssetNotFound,
                    Some(holding) => {
                        holding.status = HoldingStatus::Available;
                        holding.reservation_id = None;
                        ReserveOutcome::Success
                    }
                };
                (id.clone(), outcome)
            })
            .collect()
    }
}

fn reserve_one(holding: &mut Holding, reservation_id: &str) -> ReserveOutcome {
    match holding.status {
        HoldingStatus::Available => {
            holding.status = HoldingStatus::Reserved;
            holding.reservation_id = Some(reservation_id.to_string());
            ReserveOutcome::Success
        }
        HoldingStatus::Reserved => ReserveOutcome::Conflict,
        HoldingStatus::NotAvailable => ReserveOutcome::NotAvailable,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHolding {
    pub holding_id: String,
    pub leaf_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub snapshot_id: String,
    pub provider_id: String,
    pub holdings: Vec<SnapshotHolding>,
    pub root_hash: String,
    pub taken_at: DateTime<Utc>,
}

pub fn take_snapshot(
    snapshot_id: impl Into<String>,
    provider_id: impl Into<String>,
    holdings: &[&Holding],
    taken_at: DateTime<Utc>,
) -> InventorySnapshot {
    let provider_id = provider_id.into();
    let snapshot_holdings: Vec<SnapshotHolding> = holdings
        .iter()
        .map(|h| SnapshotHolding {
            holding_id: h.holding_id.clone(),
            leaf_hash: swapgraph_core::canonical::sha256_canonical_value(&serde_json::json!({
                "holding_id": h.holding_id,
                "asset_id": h.asset_id,
                "amount_usd": h.amount_usd,
                "status": h.status,
            })),
        })
        .collect();
    let leaf_hashes: Vec<String> = snapshot_holdings.iter().map(|h| h.leaf_hash.clone()).collect();
    let root_hash = merkle::merkle_root(&leaf_hashes);
    InventorySnapshot {
        snapshot_id: snapshot_id.into(),
        provider_id,
        holdings: snapshot_holdings,
        root_hash,
        taken_at,
    }
}

pub fn inclusion_proof_for(snapshot: &InventorySnapshot, holding_id: &str) -> Option<InclusionProof> {
    let leaves: Vec<String> = snapshot.holdings.iter().map(|h| h.leaf_hash.clone()).collect();
    let idx = snapshot.holdings.iter().position(|h| h.holding_id == holding_id)?;
    Some(merkle::build_inclusion_proof(&leaves, idx))
}

pub fn verify_inclusion(snapshot: &InventorySnapshot, holding_id: &str, proof: &InclusionProof) -> bool {
    match snapshot.holdings.iter().find(|h| h.holding_id == holding_id) {
        Some(h) => merkle::verify_inclusion_proof(&h.leaf_hash, proof, &snapshot.root_hash),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(id: &str, status: HoldingStatus) -> Holding {
        Holding {
            holding_id: id.to_string(),
            provider_id: "prov-1".to_string(),
            asset_id: "asset_a".to_string(),
            amount_usd: 100.0,
            status,
            reservation_id: None,
            context_id: None,
        }
    }

    #[test]
    fn reserve_batch_returns_per_entry_outcomes() {
        let mut registry = LiquidityRegistry::new();
        registry.upsert_holding(holding("h1", HoldingStatus::Available));
        registry.upsert_holding(holding("h2", HoldingStatus::Reserved));
        registry.upsert_holding(holding("h3", HoldingStatus::NotAvailable));

        let requests = vec![
            ReserveRequest { holding_id: "h1".to_string(), reservation_id: "r1".to_string(), context_id: None },
            ReserveRequest { holding_id: "h2".to_string(), reservation_id: "r2".to_string(), context_id: None },
            ReserveRequest { holding_id: "h3".to_string(), reservation_id: "r3".to_string(), context_id: None },
            ReserveRequest { holding_id: "missing".to_string(), reservation_id: "r4".to_string(), context_id: None },
        ];
        let outcomes = registry.reserve_batch(&requests);
        assert_eq!(outcomes[0].1, ReserveOutcome::Success);
        assert_eq!(outcomes[1].1, ReserveOutcome::Conflict);
        assert_eq!(outcomes[2].1, ReserveOutcome::NotAvailable);
        assert_eq!(outcomes[3].1, ReserveOutcome::AssetNotFound);
    }

    #[test]
    fn release_is_idempotent() {
        let mut registry = LiquidityRegistry::new();
        registry.upsert_holding(holding("h1", HoldingStatus::Reserved));
        let outcomes1 = registry.release_batch(&["h1".to_string()]);
        let outcomes2 = registry.release_batch(&["h1".to_string()]);
        assert_eq!(outcomes1[0].1, ReserveOutcome::Success);
        assert_eq!(outcomes2[0].1, ReserveOutcome::Success);
    }

    #[test]
    fn snapshot_inclusion_proof_round_trips() {
        let h1 = holding("h1", HoldingStatus::Available);
        let h2 = holding("h2", HoldingStatus::Available);
        let snapshot = take_snapshot("snap-1", "prov-1", &[&h1, &h2], Utc::now());
        let proof = inclusion_proof_for(&snapshot, "h2").unwrap();
        assert!(verify_inclusion(&snapshot, "h2", &proof));
    }

    #[test]
    fn provider_reregistration_bumps_version() {
        let mut registry = LiquidityRegistry::new();
        registry.upsert_provider("prov-1", "Acme", ProviderStatus::Active);
        registry.upsert_provider("prov-1", "Acme Renamed", ProviderStatus::Active);
        assert_eq!(registry.provider("prov-1").unwrap().version, 2);
    }
}
