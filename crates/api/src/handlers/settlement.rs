use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use swapgraph_marketplace::entities::CommitPhase;
use swapgraph_marketplace::settlement;
use swapgraph_store::{derive_event_id, EventEnvelope};

use crate::error::ApiError;
use crate::extractors::{ActorContextExtractor, IdempotencyKey};
use crate::handlers::idempotent;
use crate::models::{CompleteSettlementRequest, ConfirmDepositRequest, FailSettlementRequest};
use crate::state::AppState;

pub async fn start(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(commit_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::json!({ "commit_id": commit_id });
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let deposit_window = chrono::Duration::minutes(state.config.deposit_window_minutes);
    let partner_id = if matches!(ctx.actor.actor_type, swapgraph_core::ActorType::Partner) {
        Some(ctx.actor.id.clone())
    } else {
        None
    };

    let result = idempotent(&state, "settlement.start", actor, &idem_key, &body, move |doc| {
        let commit = doc.commits.get(&commit_id).cloned().ok_or_else(|| {
            swapgraph_marketplace::MarketplaceError::NotFound(format!("no commit {commit_id}"))
        })?;
        if commit.phase != CommitPhase::Committed {
            return Err(swapgraph_marketplace::MarketplaceError::Conflict(
                "commit is not committed".to_string(),
            ));
        }
        let proposal = doc.proposals.get(&commit.proposal_id).cloned().ok_or_else(|| {
            swapgraph_marketplace::MarketplaceError::NotFound(format!(
                "no proposal {}",
                commit.proposal_id
            ))
        })?;
        let timeline = settlement::start(&commit, &proposal, partner_id, deposit_window, now)?;
        doc.timelines.insert(timeline.cycle_id.clone(), timeline.clone());
        Ok(timeline)
    })
    .await?;
    Ok(Json(result))
}

fn caller_partner_id(ctx: &swapgraph_marketplace::auth::ActorContext) -> Option<String> {
    if matches!(ctx.actor.actor_type, swapgraph_core::ActorType::Partner) {
        Some(ctx.actor.id.clone())
    } else {
        None
    }
}

pub async fn request_deposits(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(cycle_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::json!({ "cycle_id": cycle_id });
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let caller_partner_id = caller_partner_id(&ctx);
    let result = idempotent(
        &state,
        &format!("settlement.request_deposits:{cycle_id}"),
        actor,
        &idem_key,
        &body,
        move |doc| {
            let timeline = doc.timelines.get_mut(&cycle_id).ok_or_else(|| {
                swapgraph_marketplace::MarketplaceError::NotFound(format!(
                    "no settlement timeline for cycle {cycle_id}"
                ))
            })?;
            settlement::request_deposits(timeline, caller_partner_id.as_deref(), now)?;
            Ok(timeline.clone())
        },
    )
    .await?;
    Ok(Json(result))
}

pub async fn confirm_deposit(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(cycle_id): Path<String>,
    Json(req): Json<ConfirmDepositRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let caller_partner_id = caller_partner_id(&ctx);
    let result = idempotent(
        &state,
        &format!("settlement.confirm_deposit:{cycle_id}:{}", req.intent_id),
        actor,
        &idem_key,
        &body,
        move |doc| {
            let timeline = doc.timelines.get_mut(&cycle_id).ok_or_else(|| {
                swapgraph_marketplace::MarketplaceError::NotFound(format!(
                    "no settlement timeline for cycle {cycle_id}"
                ))
            })?;
            settlement::confirm_deposit(
                timeline,
                caller_partner_id.as_deref(),
                &req.intent_id,
                req.deposit_ref.clone(),
                now,
            )?;
            Ok(timeline.clone())
        },
    )
    .await?;
    Ok(Json(result))
}

pub async fn begin_execution(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(cycle_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::json!({ "cycle_id": cycle_id });
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let caller_partner_id = caller_partner_id(&ctx);
    let result = idempotent(
        &state,
        &format!("settlement.begin_execution:{cycle_id}"),
        actor,
        &idem_key,
        &body,
        move |doc| {
            let timeline = doc.timelines.get_mut(&cycle_id).ok_or_else(|| {
                swapgraph_marketplace::MarketplaceError::NotFound(format!(
                    "no settlement timeline for cycle {cycle_id}"
                ))
            })?;
            settlement::begin_execution(timeline, caller_partner_id.as_deref(), now)?;
            Ok(timeline.clone())
        },
    )
    .await?;
    Ok(Json(result))
}

pub async fn complete(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(cycle_id): Path<String>,
    Json(req): Json<CompleteSettlementRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let caller_partner_id = caller_partner_id(&ctx);
    let receipt_id = swapgraph_core::canonical::sha256_canonical(&(cycle_id.clone(), "complete"))
        .expect("tuple always serializes");
    let scope = format!("settlement.complete:{cycle_id}");
    let key = swapgraph_store::ScopeKey::new(scope.clone(), idem_key.clone());
    let fingerprint = swapgraph_store::IdempotencyLedger::fingerprint(&body);

    if let swapgraph_store::IdempotencyOutcome::Replay(record) =
        state.store.read(|doc| doc.idempotency.check(&key, &fingerprint)).await
    {
        return Ok(Json(record.result_body));
    }

    let keys = &state.keys;
    let result = state
        .store
        .with_write(|doc| -> Result<serde_json::Value, swapgraph_marketplace::MarketplaceError> {
            let timeline = doc.timelines.get_mut(&cycle_id).ok_or_else(|| {
                swapgraph_marketplace::MarketplaceError::NotFound(format!(
                    "no settlement timeline for cycle {cycle_id}"
                ))
            })?;
            let receipt = settlement::complete(
                timeline,
                caller_partner_id.as_deref(),
                req.fees.clone(),
                keys,
                receipt_id.clone(),
                now,
            )?;
            doc.receipts.insert(receipt.id.clone(), receipt.clone());
            let body = serde_json::to_value(&receipt).expect("receipt always serializes");
            doc.idempotency
                .record(key.clone(), fingerprint.clone(), 200, body.clone(), now);
            let event_id = derive_event_id(&scope, &idem_key, &body);
            doc.outbox.append(EventEnvelope {
                event_id,
                event_type: scope.clone(),
                occurred_at: now,
                actor: actor.clone(),
                correlation_id: idem_key.clone(),
                payload: body.clone(),
            });
            Ok(body)
        })
        .await
        .map_err(ApiError::from)?;
    Ok(Json(result))
}

pub async fn fail(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(cycle_id): Path<String>,
    Json(req): Json<FailSettlementRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let caller_partner_id = caller_partner_id(&ctx);
    let receipt_id = swapgraph_core::canonical::sha256_canonical(&(cycle_id.clone(), "fail"))
        .expect("tuple always serializes");
    let scope = format!("settlement.fail:{cycle_id}");
    let key = swapgraph_store::ScopeKey::new(scope.clone(), idem_key.clone());
    let fingerprint = swapgraph_store::IdempotencyLedger::fingerprint(&body);

    if let swapgraph_store::IdempotencyOutcome::Replay(record) =
        state.store.read(|doc| doc.idempotency.check(&key, &fingerprint)).await
    {
        return Ok(Json(record.result_body));
    }

    let keys = &state.keys;

    let result = state
        .store
        .with_write(|doc| -> Result<serde_json::Value, swapgraph_marketplace::MarketplaceError> {
            let timeline = doc.timelines.get_mut(&cycle_id).ok_or_else(|| {
                swapgraph_marketplace::MarketplaceError::NotFound(format!(
                    "no settlement timeline for cycle {cycle_id}"
                ))
            })?;
            let receipt = settlement::fail(
                timeline,
                caller_partner_id.as_deref(),
                &req.reason_code,
                keys,
                receipt_id.clone(),
                now,
            )?;
            doc.receipts.insert(receipt.id.clone(), receipt.clone());
            let body = serde_json::to_value(&receipt).expect("receipt always serializes");
            doc.idempotency.record(
                key.clone(),
                fingerprint.clone(),
                200,
                body.clone(),
                now,
            );
            let event_id = derive_event_id(&scope, &idem_key, &body);
            doc.outbox.append(EventEnvelope {
                event_id,
                event_type: scope.clone(),
                occurred_at: now,
                actor: actor.clone(),
                correlation_id: idem_key.clone(),
                payload: body.clone(),
            });
            Ok(body)
        })
        .await
        .map_err(ApiError::from)?;
    Ok(Json(result))
}

/// Sweep a settlement timeline past its deposit deadline: refunds any
/// `Deposited` legs and fails the timeline if it is still waiting on
/// `EscrowPending` legs once `now` passes `deposit_deadline_at`. A no-op
/// (but still idempotent-recorded) if the timeline already moved on.
pub async fn expire(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(cycle_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::json!({ "cycle_id": cycle_id });
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let result = idempotent(
        &state,
        &format!("settlement.expire:{cycle_id}"),
        actor,
        &idem_key,
        &body,
        move |doc| {
            let timeline = doc.timelines.get_mut(&cycle_id).ok_or_else(|| {
                swapgraph_marketplace::MarketplaceError::NotFound(format!(
                    "no settlement timeline for cycle {cycle_id}"
                ))
            })?;
            settlement::expire_deposit_window(timeline, now);
            Ok(timeline.clone())
        },
    )
    .await?;
    Ok(Json(result))
}

pub async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Path(receipt_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let receipt = state
        .store
        .read(|doc| doc.receipts.get(&receipt_id).cloned())
        .await
        .ok_or_else(|| swapgraph_core::AppError::not_found(format!("no receipt {receipt_id}")))?;
    Ok(Json(serde_json::to_value(&receipt).map_err(|e| anyhow::anyhow!(e))?))
}
