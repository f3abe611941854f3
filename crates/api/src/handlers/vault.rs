use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use swapgraph_marketplace::vault;

use crate::error::ApiError;
use crate::extractors::{ActorContextExtractor, IdempotencyKey};
use crate::handlers::idempotent;
use crate::models::DepositHoldingRequest;
use crate::state::AppState;

pub async fn deposit(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Json(req): Json<DepositHoldingRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let actor = ctx.actor.clone();
    let result = idempotent(&state, "vault.deposit", actor.clone(), &idem_key, &body, move |doc| {
        let holding = vault::deposit(req.holding_id.clone(), actor, req.asset.clone());
        doc.holdings.insert(holding.holding_id.clone(), holding.clone());
        Ok(holding)
    })
    .await?;
    Ok(Json(result))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(holding_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let holding = state
        .store
        .read(|doc| doc.holdings.get(&holding_id).cloned())
        .await
        .ok_or_else(|| swapgraph_core::AppError::not_found(format!("no holding {holding_id}")))?;
    Ok(Json(serde_json::to_value(&holding).map_err(|e| anyhow::anyhow!(e))?))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
) -> Result<Json<serde_json::Value>, ApiError> {
    let holdings = state
        .store
        .read(|doc| {
            doc.holdings
                .values()
                .filter(|h| h.owner_actor.id == ctx.actor.id || ctx.has_scope("vault.read_all"))
                .cloned()
                .collect::<Vec<_>>()
        })
        .await;
    Ok(Json(serde_json::json!({ "holdings": holdings })))
}

fn not_found(holding_id: &str) -> swapgraph_marketplace::MarketplaceError {
    swapgraph_marketplace::MarketplaceError::NotFound(format!("no holding {holding_id}"))
}

#[derive(serde::Deserialize, serde::Serialize)]
pub struct ReservationRequest {
    pub reservation_id: String,
}

pub async fn reserve(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(holding_id): Path<String>,
    Json(req): Json<ReservationRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let actor = ctx.actor.clone();
    let result = idempotent(
        &state,
        &format!("vault.reserve:{holding_id}"),
        actor,
        &idem_key,
        &body,
        move |doc| {
            let holding = doc.holdings.get_mut(&holding_id).ok_or_else(|| not_found(&holding_id))?;
            vault::reserve(holding, &req.reservation_id)?;
            Ok(holding.clone())
        },
    )
    .await?;
    Ok(Json(result))
}

pub async fn release(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(holding_id): Path<String>,
    Json(req): Json<ReservationRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let actor = ctx.actor.clone();
    let result = idempotent(
        &state,
        &format!("vault.release:{holding_id}"),
        actor,
        &idem_key,
        &body,
        move |doc| {
            let holding = doc.holdings.get_mut(&holding_id).ok_or_else(|| not_found(&holding_id))?;
            vault::release(holding, &req.reservation_id)?;
            Ok(holding.clone())
        },
    )
    .await?;
    Ok(Json(result))
}

#[derive(serde::Deserialize, serde::Serialize)]
pub struct EnterSettlementRequest {
    pub reservation_id: String,
    pub cycle_id: String,
}

pub async fn enter_settlement(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(holding_id): Path<String>,
    Json(req): Json<EnterSettlementRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let actor = ctx.actor.clone();
    let result = idempotent(
        &state,
        &format!("vault.enter_settlement:{holding_id}"),
        actor,
        &idem_key,
        &body,
        move |doc| {
            let holding = doc.holdings.get_mut(&holding_id).ok_or_else(|| not_found(&holding_id))?;
            vault::enter_settlement(holding, &req.reservation_id, req.cycle_id.clone())?;
            Ok(holding.clone())
        },
    )
    .await?;
    Ok(Json(result))
}

pub async fn complete_settlement(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(holding_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::json!({ "holding_id": holding_id });
    let actor = ctx.actor.clone();
    let result = idempotent(
        &state,
        "vault.complete_settlement",
        actor,
        &idem_key,
        &body,
        move |doc| {
            let holding = doc.holdings.get_mut(&holding_id).ok_or_else(|| not_found(&holding_id))?;
            vault::complete_settlement(holding)?;
            Ok(holding.clone())
        },
    )
    .await?;
    Ok(Json(result))
}

pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(holding_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::json!({ "holding_id": holding_id });
    let actor = ctx.actor.clone();
    let result = idempotent(&state, "vault.withdraw", actor, &idem_key, &body, move |doc| {
        let holding = doc.holdings.get_mut(&holding_id).ok_or_else(|| not_found(&holding_id))?;
        vault::withdraw(holding)?;
        Ok(holding.clone())
    })
    .await?;
    Ok(Json(result))
}

pub async fn mark_not_available(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(holding_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_scopes(&["vault.admin"])?;
    let body = serde_json::json!({ "holding_id": holding_id });
    let actor = ctx.actor.clone();
    let result = idempotent(
        &state,
        "vault.mark_not_available",
        actor,
        &idem_key,
        &body,
        move |doc| {
            let holding = doc.holdings.get_mut(&holding_id).ok_or_else(|| not_found(&holding_id))?;
            vault::mark_not_available(holding);
            Ok(holding.clone())
        },
    )
    .await?;
    Ok(Json(result))
}
