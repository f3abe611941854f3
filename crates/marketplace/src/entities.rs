//! The marketplace's domain entities: swap intents, cycle proposals,
//! commits, reservations, settlement timelines, receipts, holdings, and
//! matching runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swapgraph_core::ActorRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub platform: String,
    pub app_id: String,
    pub context_id: String,
    pub asset_id: String,
    pub value_usd: f64,
    pub proof: Option<String>,
}

impl AssetDescriptor {
    /// The stable key the matcher graph edges and vault holdings key on.
    pub fn asset_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.platform, self.app_id, self.context_id, self.asset_id
        )
    }

    /// Categories this asset belongs to, for `WantSpec::Category` matching.
    /// The descriptor carries no dedicated taxonomy field, so category
    /// membership is derived from the two identity fields an asset always
    /// has: its platform and its app.
    pub fn categories(&self) -> Vec<String> {
        vec![
            format!("platform:{}", self.platform),
            format!("app:{}", self.app_id),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WantSpec {
    /// Any one of a specific list of assets satisfies the want.
    Any { asset_keys: Vec<String> },
    /// Any asset belonging to one of the given categories satisfies the want.
    Category { categories: Vec<String> },
}

impl WantSpec {
    pub fn is_satisfied_by(&self, offered: &AssetDescriptor, offered_categories: &[String]) -> bool {
        match self {
            WantSpec::Any { asset_keys } => asset_keys.contains(&offered.asset_key()),
            WantSpec::Category { categories } => {
                categories.iter().any(|c| offered_categories.contains(c))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueBand {
    pub min_usd: f64,
    pub max_usd: f64,
    pub pricing_source: String,
}

impl ValueBand {
    pub fn is_monotone(&self) -> bool {
        self.min_usd <= self.max_usd
    }

    pub fn contains(&self, value_usd: f64) -> bool {
        value_usd >= self.min_usd && value_usd <= self.max_usd
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConstraints {
    pub max_cycle_length: u32,
    pub min_counterparty_reliability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConstraints {
    pub expires_at: DateTime<Utc>,
    pub urgency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementPreferences {
    pub require_escrow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Active,
    Reserved,
    Committed,
    Cancelled,
    Settled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapIntent {
    pub id: String,
    pub partner_id: Option<String>,
    pub actor: ActorRef,
    pub offer: Vec<AssetDescriptor>,
    pub want_spec: WantSpec,
    pub value_band: ValueBand,
    pub trust_constraints: TrustConstraints,
    pub time_constraints: TimeConstraints,
    pub settlement_preferences: SettlementPreferences,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalParticipant {
    pub intent_id: String,
    pub from: ActorRef,
    pub to: ActorRef,
    pub asset_key: String,
    pub value_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Live,
    Expired,
    Superseded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleProposal {
    pub id: String,
    pub partner_id: Option<String>,
    pub participants: Vec<ProposalParticipant>,
    pub expires_at: DateTime<Utc>,
    pub value_closure_delta: f64,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

impl CycleProposal {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == ProposalStatus::Live && self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPhase {
    Accepting,
    Committed,
    Declined,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub proposal_id: String,
    pub phase: CommitPhase,
    pub acceptances: Vec<ActorRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub intent_id: String,
    pub proposal_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineState {
    Accepted,
    EscrowPending,
    EscrowReady,
    Executing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegStatus {
    Pending,
    Deposited,
    Released,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositMode {
    Deposit,
    Vault,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementLeg {
    pub intent_id: String,
    pub from_actor: ActorRef,
    pub to_actor: ActorRef,
    pub assets: Vec<AssetDescriptor>,
    pub status: LegStatus,
    pub deposit_mode: DepositMode,
    pub deposit_deadline_at: DateTime<Utc>,
    pub deposit_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementTimeline {
    pub cycle_id: String,
    /// Mutable tenancy scope: cleared out-of-band, it is the thing replay
    /// is allowed to restore. Never rebind to a different value once set.
    pub partner_id: Option<String>,
    /// Immutable record of whichever partner originated this settlement,
    /// set once at `start` and never touched again. `partner_id` can only
    /// ever be healed back to this value, never to anything else.
    pub origin_partner_id: Option<String>,
    pub state: TimelineState,
    pub legs: Vec<SettlementLeg>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalState {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptTransparency {
    pub reason_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub cycle_id: String,
    pub final_state: FinalState,
    pub intent_ids: Vec<String>,
    pub asset_ids: Vec<String>,
    pub fees: Vec<serde_json::Value>,
    pub transparency: ReceiptTransparency,
    pub signature: swapgraph_core::signing::DetachedSignature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingStatus {
    Available,
    Reserved,
    InSettlement,
    Withdrawn,
    NotAvailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub holding_id: String,
    pub owner_actor: ActorRef,
    pub asset: AssetDescriptor,
    pub status: HoldingStatus,
    pub reservation_id: Option<String>,
    pub settlement_cycle_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanarySamples {
    pub error_rate_bps: u32,
    pub timeout_rate_bps: u32,
    pub limited_rate_bps: u32,
    pub non_negative_delta_rate_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingRun {
    pub run_id: String,
    pub selected_proposals_count: usize,
    pub stats: serde_json::Value,
    pub proposal_ids: Vec<String>,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
}
