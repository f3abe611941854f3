//! Route table: one line per operation, grouped by resource.

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{
    delegations, health, intents, keys, liquidity, matching, policy_audit, proposals, settlement,
    transparency, vault,
};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health::get))
        .route("/v1/keys", get(keys::list))
        .route("/v1/swap-intents", post(intents::create).get(intents::list))
        .route(
            "/v1/swap-intents/:intent_id",
            get(intents::get).patch(intents::update),
        )
        .route("/v1/swap-intents/:intent_id/cancel", post(intents::cancel))
        .route("/v1/matching-runs", post(matching::create))
        .route("/v1/matching-runs/:run_id", get(matching::get))
        .route("/v1/cycle-proposals", get(proposals::list))
        .route("/v1/cycle-proposals/:proposal_id", get(proposals::get))
        .route(
            "/v1/cycle-proposals/:proposal_id/accept",
            post(proposals::accept_proposal),
        )
        .route(
            "/v1/cycle-proposals/:proposal_id/decline",
            post(proposals::decline_proposal),
        )
        .route(
            "/v1/cycle-proposals/:proposal_id/expire",
            post(proposals::expire_proposal),
        )
        .route("/v1/commits/:commit_id/settlement", post(settlement::start))
        .route(
            "/v1/settlement-timelines/:cycle_id/request-deposits",
            post(settlement::request_deposits),
        )
        .route(
            "/v1/settlement-timelines/:cycle_id/confirm-deposit",
            post(settlement::confirm_deposit),
        )
        .route(
            "/v1/settlement-timelines/:cycle_id/begin-execution",
            post(settlement::begin_execution),
        )
        .route(
            "/v1/settlement-timelines/:cycle_id/complete",
            post(settlement::complete),
        )
        .route(
            "/v1/settlement-timelines/:cycle_id/fail",
            post(settlement::fail),
        )
        .route(
            "/v1/settlement-timelines/:cycle_id/expire",
            post(settlement::expire),
        )
        .route("/v1/receipts/:receipt_id", get(settlement::get_receipt))
        .route("/v1/vault/holdings", post(vault::deposit).get(vault::list))
        .route("/v1/vault/holdings/:holding_id", get(vault::get))
        .route(
            "/v1/vault/holdings/:holding_id/reserve",
            post(vault::reserve),
        )
        .route(
            "/v1/vault/holdings/:holding_id/release",
            post(vault::release),
        )
        .route(
            "/v1/vault/holdings/:holding_id/enter-settlement",
            post(vault::enter_settlement),
        )
        .route(
            "/v1/vault/holdings/:holding_id/complete-settlement",
            post(vault::complete_settlement),
        )
        .route(
            "/v1/vault/holdings/:holding_id/withdraw",
            post(vault::withdraw),
        )
        .route(
            "/v1/vault/holdings/:holding_id/mark-not-available",
            post(vault::mark_not_available),
        )
        .route("/v1/delegations", post(delegations::create))
        .route("/v1/delegations/:delegation_id", get(delegations::get))
        .route("/v1/policy-audit", get(policy_audit::list))
        .route("/v1/policy-audit/export", get(policy_audit::export))
        .route("/v1/transparency-log", get(transparency::list))
        .route("/v1/transparency-log/batches", post(transparency::append))
        .route("/v1/transparency-log/export", get(transparency::export))
        .route(
            "/v1/liquidity/providers",
            put(liquidity::upsert_provider),
        )
        .route("/v1/liquidity/providers/:provider_id", get(liquidity::get_provider))
        .route("/v1/liquidity/personas", put(liquidity::upsert_persona))
        .route(
            "/v1/liquidity/providers/:provider_id/snapshot",
            post(liquidity::snapshot),
        )
        .route(
            "/v1/liquidity/inclusion-proof/verify",
            post(liquidity::verify_inclusion_proof),
        )
        .route("/v1/liquidity/reserve-batch", post(liquidity::reserve_batch))
        .route("/v1/liquidity/release-batch", post(liquidity::release_batch))
        .route("/v1/liquidity/export", get(liquidity::export))
        .with_state(state)
}
