//! The single in-memory document guarded by `swapgraph_store::Store`:
//! every marketplace collection plus the generic ledger/policy state it
//! composes with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use swapgraph_core::export::ExportCheckpointRecord;
use swapgraph_ledger::{LiquidityRegistry, TransparencyLog};
use swapgraph_policy::{DelegationToken, PolicyEngineState};
use swapgraph_store::{CollectionCounts, EventOutbox, IdempotencyLedger, RehydrateOutbox};

use crate::entities::{
    Commit, CycleProposal, Holding, MatchingRun, Receipt, SettlementTimeline, SwapIntent,
};
use crate::reservations::ReservationBook;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketplaceState {
    pub intents: BTreeMap<String, SwapIntent>,
    pub proposals: BTreeMap<String, CycleProposal>,
    pub commits: BTreeMap<String, Commit>,
    pub reservations: ReservationBook,
    pub timelines: BTreeMap<String, SettlementTimeline>,
    pub receipts: BTreeMap<String, Receipt>,
    pub holdings: BTreeMap<String, Holding>,
    pub matching_runs: BTreeMap<String, MatchingRun>,
    pub delegations: BTreeMap<String, DelegationToken>,
    pub policy: PolicyEngineState,
    pub transparency_log: TransparencyLog,
    pub liquidity_registry: LiquidityRegistry,
    pub outbox: EventOutbox,
    pub idempotency: IdempotencyLedger,
    /// One retained checkpoint per export stream (`policy_audit`,
    /// `transparency_log`, `liquidity`), keyed by stream name — each
    /// stream's continuity chain and retention TTL are independent of the
    /// others (Open Question ii).
    pub export_checkpoints: BTreeMap<String, ExportCheckpointRecord>,
}

impl CollectionCounts for MarketplaceState {
    fn collection_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        counts.insert("intents".to_string(), self.intents.len());
        counts.insert("proposals".to_string(), self.proposals.len());
        counts.insert("commits".to_string(), self.commits.len());
        counts.insert("reservations".to_string(), self.reservations.len());
        counts.insert("timelines".to_string(), self.timelines.len());
        counts.insert("receipts".to_string(), self.receipts.len());
        counts.insert("holdings".to_string(), self.holdings.len());
        counts.insert("matching_runs".to_string(), self.matching_runs.len());
        counts.insert("delegations".to_string(), self.delegations.len());
        counts.insert(
            "policy_audit_entries".to_string(),
            self.policy.audit_log.len(),
        );
        counts.insert(
            "transparency_batches".to_string(),
            self.transparency_log.batches().len(),
        );
        counts.insert(
            "liquidity_providers".to_string(),
            self.liquidity_registry.provider_count(),
        );
        counts.insert("outbox_events".to_string(), self.outbox.len());
        counts.insert("idempotency_records".to_string(), self.idempotency.len());
        counts.insert(
            "export_checkpoints".to_string(),
            self.export_checkpoints.len(),
        );
        counts
    }
}

impl RehydrateOutbox for MarketplaceState {
    fn rehydrate_outbox(&mut self) {
        self.outbox.rehydrate();
    }
}
