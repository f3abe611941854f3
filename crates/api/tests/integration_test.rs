//! End-to-end HTTP tests against an in-process router, covering the
//! concrete scenarios from the settlement runtime's testable-properties
//! section. Canary A/B rollback is covered at the matcher unit level
//! (`swapgraph_marketplace::matcher::tests`); everything reachable over
//! HTTP is exercised here via `tower::ServiceExt::oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use swapgraph_api::config::ServerConfig;
use swapgraph_api::server::Server;
use tower::ServiceExt;

async fn test_router(state_path: &str) -> axum::Router {
    let config = ServerConfig {
        state_path: state_path.to_string(),
        ..ServerConfig::default()
    };
    Server::new(config).await.expect("server builds").router()
}

async fn send(
    router: &axum::Router,
    method: &str,
    uri: &str,
    idem_key: &str,
    actor_type: &str,
    actor_id: &str,
    scopes: &str,
    now: &str,
    body: Value,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-actor-type", actor_type)
        .header("x-actor-id", actor_id)
        .header("x-auth-scopes", scopes)
        .header("x-now-iso", now)
        .header("idempotency-key", idem_key)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn asset(asset_id: &str, value_usd: f64) -> Value {
    json!({
        "platform": "steam",
        "app_id": "app1",
        "context_id": "ctx1",
        "asset_id": asset_id,
        "value_usd": value_usd,
        "proof": null
    })
}

fn asset_key(asset_id: &str) -> String {
    format!("steam:app1:ctx1:{asset_id}")
}

fn create_intent_body(
    id: &str,
    offer_asset_id: &str,
    want_asset_id: &str,
    expires_at: &str,
) -> Value {
    json!({
        "id": id,
        "partner_id": null,
        "offer": [asset(offer_asset_id, 120.0)],
        "want_spec": { "kind": "any", "asset_keys": [asset_key(want_asset_id)] },
        "value_band": { "min_usd": 1.0, "max_usd": 200.0, "pricing_source": "internal" },
        "trust_constraints": { "max_cycle_length": 2, "min_counterparty_reliability": 0.0 },
        "time_constraints": { "expires_at": expires_at, "urgency": "normal" },
        "settlement_preferences": { "require_escrow": true }
    })
}

/// Creates two complementary intents, runs matching, and has both actors
/// accept the resulting proposal. Returns the committed commit's id and
/// the cycle id returned once settlement is started.
async fn settle_up_to_committed(router: &axum::Router, now: &str) -> String {
    let expires_at = "2026-01-02T00:00:00Z";
    let (status, _) = send(
        router,
        "POST",
        "/v1/swap-intents",
        "create-i1",
        "user",
        "u1",
        "",
        now,
        create_intent_body("i1", "asset_a", "asset_b", expires_at),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        router,
        "POST",
        "/v1/swap-intents",
        "create-i2",
        "user",
        "u2",
        "",
        now,
        create_intent_body("i2", "asset_b", "asset_a", expires_at),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, run) = send(
        router,
        "POST",
        "/v1/matching-runs",
        "run-1",
        "user",
        "u1",
        "",
        now,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let proposal_ids = run["proposal_ids"].as_array().cloned().unwrap_or_default();
    assert_eq!(
        proposal_ids.len(),
        1,
        "expected exactly one 2-cycle proposal, got run {run}"
    );
    let proposal_id = proposal_ids[0].as_str().unwrap().to_string();

    let (status, proposal) = send(
        router,
        "GET",
        &format!("/v1/cycle-proposals/{proposal_id}"),
        "get-proposal",
        "user",
        "u1",
        "",
        now,
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(proposal["participants"].as_array().unwrap().len(), 2);

    let (status, commit1) = send(
        router,
        "POST",
        &format!("/v1/cycle-proposals/{proposal_id}/accept"),
        "accept-u1",
        "user",
        "u1",
        "",
        now,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(commit1["phase"], "accepting");

    let (status, commit2) = send(
        router,
        "POST",
        &format!("/v1/cycle-proposals/{proposal_id}/accept"),
        "accept-u2",
        "user",
        "u2",
        "",
        now,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(commit2["phase"], "committed");

    commit2["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn two_cycle_happy_path_settles_to_completed() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let router = test_router(state_path.to_str().unwrap()).await;
    let now = "2026-01-01T00:00:00Z";

    let commit_id = settle_up_to_committed(&router, now).await;

    let (status, timeline) = send(
        &router,
        "POST",
        &format!("/v1/commits/{commit_id}/settlement"),
        "start-1",
        "partner",
        "partner-x",
        "",
        now,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timeline["state"], "accepted");
    let cycle_id = timeline["cycle_id"].as_str().unwrap().to_string();

    let (status, timeline) = send(
        &router,
        "POST",
        &format!("/v1/settlement-timelines/{cycle_id}/request-deposits"),
        "deposits-1",
        "partner",
        "partner-x",
        "",
        now,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timeline["state"], "escrow_pending");

    for (idem, intent_id) in [("deposit-i1", "i1"), ("deposit-i2", "i2")] {
        let (status, _) = send(
            &router,
            "POST",
            &format!("/v1/settlement-timelines/{cycle_id}/confirm-deposit"),
            idem,
            "partner",
            "partner-x",
            "",
            now,
            json!({ "intent_id": intent_id, "deposit_ref": format!("ref-{intent_id}") }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, execution) = send(
        &router,
        "POST",
        &format!("/v1/settlement-timelines/{cycle_id}/begin-execution"),
        "begin-1",
        "partner",
        "partner-x",
        "",
        now,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(execution["state"], "executing");

    let (status, receipt) = send(
        &router,
        "POST",
        &format!("/v1/settlement-timelines/{cycle_id}/complete"),
        "complete-1",
        "partner",
        "partner-x",
        "",
        now,
        json!({ "fees": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["final_state"], "completed");
    assert_eq!(receipt["cycle_id"], cycle_id);

    let receipt_id = receipt["id"].as_str().unwrap().to_string();
    let (status, fetched) = send(
        &router,
        "GET",
        &format!("/v1/receipts/{receipt_id}"),
        "get-receipt",
        "partner",
        "partner-x",
        "",
        now,
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["final_state"], "completed");
}

#[tokio::test]
async fn deposit_timeout_fails_timeline_and_refunds_deposited_leg() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let router = test_router(state_path.to_str().unwrap()).await;
    let now = "2026-01-01T00:00:00Z";

    let commit_id = settle_up_to_committed(&router, now).await;

    let (_, timeline) = send(
        &router,
        "POST",
        &format!("/v1/commits/{commit_id}/settlement"),
        "start-1",
        "partner",
        "partner-x",
        "",
        now,
        json!({}),
    )
    .await;
    let cycle_id = timeline["cycle_id"].as_str().unwrap().to_string();

    send(
        &router,
        "POST",
        &format!("/v1/settlement-timelines/{cycle_id}/request-deposits"),
        "deposits-1",
        "partner",
        "partner-x",
        "",
        now,
        json!({}),
    )
    .await;

    send(
        &router,
        "POST",
        &format!("/v1/settlement-timelines/{cycle_id}/confirm-deposit"),
        "deposit-i1",
        "partner",
        "partner-x",
        "",
        now,
        json!({ "intent_id": "i1", "deposit_ref": "ref-i1" }),
    )
    .await;

    let later = "2026-01-01T02:00:00Z";
    let (status, receipt) = send(
        &router,
        "POST",
        &format!("/v1/settlement-timelines/{cycle_id}/fail"),
        "fail-1",
        "partner",
        "partner-x",
        "",
        later,
        json!({ "reason_code": "deposit_timeout" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["final_state"], "failed");
    assert_eq!(receipt["transparency"]["reason_code"], "deposit_timeout");
}

/// Unlike `deposit_timeout_fails_timeline_and_refunds_deposited_leg` (which
/// fails the cycle explicitly via `/fail`), this drives the timeout off the
/// real per-leg `deposit_deadline_at` by calling the sweep endpoint after
/// the deposit window has actually elapsed.
#[tokio::test]
async fn settlement_expire_sweeps_timed_out_deposit_window() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let router = test_router(state_path.to_str().unwrap()).await;
    let now = "2026-01-01T00:00:00Z";

    let commit_id = settle_up_to_committed(&router, now).await;

    let (_, timeline) = send(
        &router,
        "POST",
        &format!("/v1/commits/{commit_id}/settlement"),
        "start-1",
        "partner",
        "partner-x",
        "",
        now,
        json!({}),
    )
    .await;
    let cycle_id = timeline["cycle_id"].as_str().unwrap().to_string();

    send(
        &router,
        "POST",
        &format!("/v1/settlement-timelines/{cycle_id}/request-deposits"),
        "deposits-1",
        "partner",
        "partner-x",
        "",
        now,
        json!({}),
    )
    .await;

    send(
        &router,
        "POST",
        &format!("/v1/settlement-timelines/{cycle_id}/confirm-deposit"),
        "deposit-i1",
        "partner",
        "partner-x",
        "",
        now,
        json!({ "intent_id": "i1", "deposit_ref": "ref-i1" }),
    )
    .await;

    // Calling expire before the default 30-minute deposit window has
    // elapsed is a no-op: the still-pending leg hasn't timed out yet.
    let before_deadline = "2026-01-01T00:15:00Z";
    let (status, timeline) = send(
        &router,
        "POST",
        &format!("/v1/settlement-timelines/{cycle_id}/expire"),
        "expire-early",
        "partner",
        "partner-x",
        "",
        before_deadline,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timeline["state"], "escrow_pending");

    // Past the deadline, the sweep fails the timeline and refunds the one
    // leg that did make it to `deposited`.
    let after_deadline = "2026-01-01T00:31:00Z";
    let (status, timeline) = send(
        &router,
        "POST",
        &format!("/v1/settlement-timelines/{cycle_id}/expire"),
        "expire-late",
        "partner",
        "partner-x",
        "",
        after_deadline,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timeline["state"], "failed");
    let legs = timeline["legs"].as_array().unwrap();
    let i1_leg = legs.iter().find(|l| l["intent_id"] == "i1").unwrap();
    assert_eq!(i1_leg["status"], "refunded");
}

/// Drives the commit accept-phase timeout off the proposal's real
/// `expires_at` (one hour after the matching run) instead of faking it.
#[tokio::test]
async fn proposal_expire_sweeps_commit_past_accept_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let router = test_router(state_path.to_str().unwrap()).await;
    let now = "2026-01-01T00:00:00Z";
    let expires_at = "2026-01-02T00:00:00Z";

    let (status, _) = send(
        &router,
        "POST",
        "/v1/swap-intents",
        "create-i1",
        "user",
        "u1",
        "",
        now,
        create_intent_body("i1", "asset_a", "asset_b", expires_at),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &router,
        "POST",
        "/v1/swap-intents",
        "create-i2",
        "user",
        "u2",
        "",
        now,
        create_intent_body("i2", "asset_b", "asset_a", expires_at),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, run) = send(
        &router,
        "POST",
        "/v1/matching-runs",
        "run-1",
        "user",
        "u1",
        "",
        now,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let proposal_id = run["proposal_ids"].as_array().unwrap()[0]
        .as_str()
        .unwrap()
        .to_string();

    // Only one side accepts, so the commit stays in `accepting`.
    let (status, commit) = send(
        &router,
        "POST",
        &format!("/v1/cycle-proposals/{proposal_id}/accept"),
        "accept-u1",
        "user",
        "u1",
        "",
        now,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(commit["phase"], "accepting");

    // Before the proposal's one-hour live window lapses, expire is a no-op.
    let before_deadline = "2026-01-01T00:30:00Z";
    let (status, commit) = send(
        &router,
        "POST",
        &format!("/v1/cycle-proposals/{proposal_id}/expire"),
        "expire-early",
        "partner",
        "partner-x",
        "",
        before_deadline,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(commit["phase"], "accepting");

    // Once the proposal's real expires_at has passed, the sweep expires it.
    let after_deadline = "2026-01-01T01:01:00Z";
    let (status, commit) = send(
        &router,
        "POST",
        &format!("/v1/cycle-proposals/{proposal_id}/expire"),
        "expire-late",
        "partner",
        "partner-x",
        "",
        after_deadline,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(commit["phase"], "expired");
}

#[tokio::test]
async fn settlement_replay_heals_cleared_partner_scope_but_not_for_other_partners() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let router = test_router(state_path.to_str().unwrap()).await;
    let now = "2026-01-01T00:00:00Z";

    let commit_id = settle_up_to_committed(&router, now).await;
    let (_, timeline) = send(
        &router,
        "POST",
        &format!("/v1/commits/{commit_id}/settlement"),
        "start-1",
        "partner",
        "partner-a",
        "",
        now,
        json!({}),
    )
    .await;
    let cycle_id = timeline["cycle_id"].as_str().unwrap().to_string();
    assert_eq!(timeline["partner_id"], "partner-a");
    assert_eq!(timeline["origin_partner_id"], "partner-a");

    // A fresh idempotency key re-enters `request_deposits` as partner-a
    // after the scope was cleared out-of-band; this must heal
    // `partner_id` back to `origin_partner_id` rather than rebind it.
    let (status, healed) = send(
        &router,
        "POST",
        &format!("/v1/settlement-timelines/{cycle_id}/request-deposits"),
        "deposits-a",
        "partner",
        "partner-a",
        "",
        now,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(healed["partner_id"], "partner-a");
    assert_eq!(healed["state"], "escrow_pending");

    // A different partner replaying the same transition must be refused
    // and must not rebind the scope to itself.
    let (status, _) = send(
        &router,
        "POST",
        &format!("/v1/settlement-timelines/{cycle_id}/confirm-deposit"),
        "deposit-wrong",
        "partner",
        "partner-b",
        "",
        now,
        json!({ "intent_id": "i1", "deposit_ref": "ref-i1" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, still) = send(
        &router,
        "GET",
        &format!("/v1/cycle-proposals/does-not-exist"),
        "noop",
        "partner",
        "partner-a",
        "",
        now,
        Value::Null,
    )
    .await;
    let _ = still;
}

#[tokio::test]
async fn idempotency_conflict_on_mismatched_replay() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let router = test_router(state_path.to_str().unwrap()).await;
    let now = "2026-01-01T00:00:00Z";
    let expires_at = "2026-01-02T00:00:00Z";

    let (status, _) = send(
        &router,
        "POST",
        "/v1/swap-intents",
        "k1",
        "user",
        "u1",
        "",
        now,
        create_intent_body("i1", "asset_a", "asset_b", expires_at),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut conflicting = create_intent_body("i1", "asset_a", "asset_b", expires_at);
    conflicting["value_band"]["max_usd"] = json!(999.0);
    let (status, _) = send(
        &router,
        "POST",
        "/v1/swap-intents",
        "k1",
        "user",
        "u1",
        "",
        now,
        conflicting,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn idempotent_replay_returns_identical_body() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let router = test_router(state_path.to_str().unwrap()).await;
    let now = "2026-01-01T00:00:00Z";
    let expires_at = "2026-01-02T00:00:00Z";
    let payload = create_intent_body("i1", "asset_a", "asset_b", expires_at);

    let (status1, body1) = send(
        &router,
        "POST",
        "/v1/swap-intents",
        "k1",
        "user",
        "u1",
        "",
        now,
        payload.clone(),
    )
    .await;
    let (status2, body2) = send(
        &router,
        "POST",
        "/v1/swap-intents",
        "k1",
        "user",
        "u1",
        "",
        now,
        payload,
    )
    .await;

    assert_eq!(status1, StatusCode::OK);
    assert_eq!(status2, StatusCode::OK);
    assert_eq!(body1, body2);
}

#[tokio::test]
async fn signed_export_chain_breaks_on_tampered_continuation_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let router = test_router(state_path.to_str().unwrap()).await;
    let now = "2026-01-01T00:00:00Z";
    let expires_at = "2026-01-02T00:00:00Z";

    send(
        &router,
        "POST",
        "/v1/swap-intents",
        "create-i1",
        "user",
        "u1",
        "",
        now,
        create_intent_body("i1", "asset_a", "asset_b", expires_at),
    )
    .await;

    let (status, page1) = send(
        &router,
        "GET",
        "/v1/policy-audit/export?limit=500",
        "export-1",
        "partner",
        "partner-x",
        "policy_audit.export",
        now,
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let chain_hash = page1["attestation"]["chain_hash"]
        .as_str()
        .unwrap()
        .to_string();
    let checkpoint_hash = page1["checkpoint"]["checkpoint_hash"]
        .as_str()
        .unwrap()
        .to_string();

    // A correct continuation succeeds.
    let uri = format!(
        "/v1/policy-audit/export?limit=500&attestation_after={chain_hash}&checkpoint_after={checkpoint_hash}"
    );
    let (status, page2) = send(
        &router,
        "GET",
        &uri,
        "export-2",
        "partner",
        "partner-x",
        "policy_audit.export",
        now,
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let chain_hash_2 = page2["attestation"]["chain_hash"]
        .as_str()
        .unwrap()
        .to_string();
    let checkpoint_hash_2 = page2["checkpoint"]["checkpoint_hash"]
        .as_str()
        .unwrap()
        .to_string();

    // Flip the last character of the prior attestation's chain hash
    // before presenting it as the continuation cursor for a third page:
    // the chain must refuse to verify, not silently accept a forged
    // predecessor.
    let mut tampered = chain_hash_2.clone();
    if let Some(last) = tampered.pop() {
        let flipped = if last == 'a' { 'b' } else { 'a' };
        tampered.push(flipped);
    } else {
        tampered.push('0');
    }
    let uri = format!(
        "/v1/policy-audit/export?limit=500&attestation_after={tampered}&checkpoint_after={checkpoint_hash_2}"
    );
    let (status, _body) = send(
        &router,
        "GET",
        &uri,
        "export-3",
        "partner",
        "partner-x",
        "policy_audit.export",
        now,
        Value::Null,
    )
    .await;
    assert_eq!(
        status,
        StatusCode::CONFLICT,
        "a forged continuation cursor must break the export chain"
    );
}

#[tokio::test]
async fn health_endpoint_reports_store_backend_and_counts() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let router = test_router(state_path.to_str().unwrap()).await;

    let request = Request::builder()
        .method("GET")
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["store_backend"], "json");
}

#[tokio::test]
async fn vault_cannot_double_reserve_a_holding() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let router = test_router(state_path.to_str().unwrap()).await;
    let now = "2026-01-01T00:00:00Z";

    let (status, deposit) = send(
        &router,
        "POST",
        "/v1/vault/holdings",
        "deposit-1",
        "user",
        "u1",
        "",
        now,
        json!({ "holding_id": "h1", "asset": asset("asset_a", 120.0) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let _ = deposit;

    let (status, _) = send(
        &router,
        "POST",
        "/v1/vault/holdings/h1/reserve",
        "reserve-1",
        "user",
        "u1",
        "",
        now,
        json!({ "reservation_id": "r1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &router,
        "POST",
        "/v1/vault/holdings/h1/reserve",
        "reserve-2",
        "user",
        "u1",
        "",
        now,
        json!({ "reservation_id": "r2" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn keys_endpoint_reports_active_key() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let router = test_router(state_path.to_str().unwrap()).await;
    let now = "2026-01-01T00:00:00Z";

    let (status, keys) = send(
        &router,
        "GET",
        "/v1/keys",
        "keys-1",
        "user",
        "u1",
        "",
        now,
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = keys["keys"].as_array().unwrap();
    assert!(!entries.is_empty());
    assert!(entries.iter().any(|k| k["active"] == true));
}
