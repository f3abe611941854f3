//! Request/response DTOs for operations that don't already have a natural
//! shape in `swapgraph-marketplace`'s entities. Everything else (intents,
//! proposals, receipts, holdings, ...) is returned as the domain entity
//! itself.

use serde::{Deserialize, Serialize};
use swapgraph_marketplace::entities::{
    SettlementPreferences, TimeConstraints, TrustConstraints, ValueBand, WantSpec,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    pub id: String,
    pub partner_id: Option<String>,
    pub offer: Vec<swapgraph_marketplace::entities::AssetDescriptor>,
    pub want_spec: WantSpec,
    pub value_band: ValueBand,
    pub trust_constraints: TrustConstraints,
    pub time_constraints: TimeConstraints,
    pub settlement_preferences: SettlementPreferences,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateIntentRequest {
    pub value_band: Option<ValueBand>,
    pub time_constraints: Option<TimeConstraints>,
    pub trust_constraints: Option<TrustConstraints>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMatchingRunRequest {
    #[serde(default)]
    pub partner_id: Option<String>,
    #[serde(default)]
    pub engine_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmDepositRequest {
    pub intent_id: String,
    pub deposit_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteSettlementRequest {
    #[serde(default)]
    pub fees: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailSettlementRequest {
    pub reason_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositHoldingRequest {
    pub holding_id: String,
    pub asset: swapgraph_marketplace::entities::AssetDescriptor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelIntentRequest {
    /// Present when the bearer on `authorization` names a delegation; lets
    /// an agent cancel on a user's behalf with their signed-off consent.
    #[serde(default)]
    pub consent: Option<swapgraph_policy::ConsentProof>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDelegationRequest {
    pub delegation_id: String,
    pub subject_actor_id: String,
    pub scopes: Vec<String>,
    pub operation_allowlist: Vec<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub spend_cap_per_day_usd: Option<f64>,
    #[serde(default)]
    pub require_consent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub attestation_after: Option<String>,
    #[serde(default)]
    pub checkpoint_after: Option<String>,
    #[serde(default)]
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub store_backend: &'static str,
    pub persistence_mode: &'static str,
    pub state: HealthState,
}

#[derive(Debug, Serialize)]
pub struct HealthState {
    pub version: u64,
    pub state_sha256: String,
    pub counts: std::collections::BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
pub struct KeySetEntry {
    pub key_id: String,
    pub active: bool,
}
