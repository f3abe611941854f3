use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use swapgraph_core::export::{build_signed_export, ContinuationClaim};
use swapgraph_ledger::{take_snapshot, verify_inclusion, ProviderStatus, ReserveOutcome, ReserveRequest};

use crate::error::ApiError;
use crate::extractors::{ActorContextExtractor, IdempotencyKey};
use crate::handlers::idempotent;
use crate::models::ExportQuery;
use crate::state::AppState;

const STREAM: &str = "liquidity";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpsertProviderRequest {
    pub provider_id: String,
    pub name: String,
    #[serde(default)]
    pub suspended: bool,
}

pub async fn upsert_provider(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Json(req): Json<UpsertProviderRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_scopes(&["liquidity.admin"])?;
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let actor = ctx.actor.clone();
    let status = if req.suspended {
        ProviderStatus::Suspended
    } else {
        ProviderStatus::Active
    };
    let result = idempotent(&state, "liquidity.upsert_provider", actor, &idem_key, &body, move |doc| {
        let provider = doc
            .liquidity_registry
            .upsert_provider(req.provider_id.clone(), req.name.clone(), status);
        Ok(provider.clone())
    })
    .await?;
    Ok(Json(result))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpsertPersonaRequest {
    pub persona_id: String,
    pub provider_id: String,
    pub scopes: Vec<String>,
}

pub async fn upsert_persona(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Json(req): Json<UpsertPersonaRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_scopes(&["liquidity.admin"])?;
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let actor = ctx.actor.clone();
    let result = idempotent(&state, "liquidity.upsert_persona", actor, &idem_key, &body, move |doc| {
        let persona = doc.liquidity_registry.upsert_persona(
            req.persona_id.clone(),
            req.provider_id.clone(),
            req.scopes.clone(),
        );
        Ok(persona.clone())
    })
    .await?;
    Ok(Json(result))
}

pub async fn get_provider(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let provider = state
        .store
        .read(|doc| doc.liquidity_registry.provider(&provider_id).cloned())
        .await
        .ok_or_else(|| swapgraph_core::AppError::not_found(format!("no provider {provider_id}")))?;
    Ok(Json(serde_json::to_value(&provider).map_err(|e| anyhow::anyhow!(e))?))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReserveBatchRequest {
    pub requests: Vec<ReserveEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReserveEntry {
    pub holding_id: String,
    pub reservation_id: String,
    #[serde(default)]
    pub context_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchOutcome {
    holding_id: String,
    outcome: ReserveOutcome,
}

pub async fn reserve_batch(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Json(req): Json<ReserveBatchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_scopes(&["liquidity.execute"])?;
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let actor = ctx.actor.clone();
    let result = idempotent(&state, "liquidity.reserve_batch", actor, &idem_key, &body, move |doc| {
        let requests: Vec<ReserveRequest> = req
            .requests
            .iter()
            .map(|e| ReserveRequest {
                holding_id: e.holding_id.clone(),
                reservation_id: e.reservation_id.clone(),
                context_id: e.context_id.clone(),
            })
            .collect();
        let outcomes = doc
            .liquidity_registry
            .reserve_batch(&requests)
            .into_iter()
            .map(|(holding_id, outcome)| BatchOutcome { holding_id, outcome })
            .collect::<Vec<_>>();
        Ok(outcomes)
    })
    .await?;
    Ok(Json(result))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReleaseBatchRequest {
    pub holding_ids: Vec<String>,
}

pub async fn release_batch(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Json(req): Json<ReleaseBatchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_scopes(&["liquidity.execute"])?;
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let actor = ctx.actor.clone();
    let result = idempotent(&state, "liquidity.release_batch", actor, &idem_key, &body, move |doc| {
        let outcomes = doc
            .liquidity_registry
            .release_batch(&req.holding_ids)
            .into_iter()
            .map(|(holding_id, outcome)| BatchOutcome { holding_id, outcome })
            .collect::<Vec<_>>();
        Ok(outcomes)
    })
    .await?;
    Ok(Json(result))
}

pub async fn snapshot(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(provider_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_scopes(&["liquidity.read"])?;
    let body = serde_json::json!({ "provider_id": provider_id });
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let snapshot_id = swapgraph_core::canonical::sha256_canonical(&(&provider_id, &idem_key))
        .expect("tuple always serializes");
    let result = idempotent(&state, "liquidity.snapshot", actor, &idem_key, &body, move |doc| {
        let holdings = doc.liquidity_registry.holdings_for_provider(&provider_id);
        let snap = take_snapshot(snapshot_id.clone(), provider_id.clone(), &holdings, now);
        Ok(snap)
    })
    .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct VerifyInclusionRequest {
    pub snapshot: swapgraph_ledger::InventorySnapshot,
    pub proof: swapgraph_ledger::InclusionProof,
    pub holding_id: String,
}

pub async fn verify_inclusion_proof(
    Json(req): Json<VerifyInclusionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ok = verify_inclusion(&req.snapshot, &req.holding_id, &req.proof);
    Ok(Json(serde_json::json!({ "included": ok })))
}

pub async fn export(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    Query(query): Query<ExportQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_scopes(&["liquidity.export"])?;
    let now = ctx.now;
    let limit = query.limit.unwrap_or(500);
    let ttl = state.config.export_retention.ttl_for(STREAM);
    let claim = ContinuationClaim {
        attestation_after: query.attestation_after.clone(),
        checkpoint_after: query.checkpoint_after.clone(),
    };

    let result = state
        .store
        .with_write(|doc| -> Result<serde_json::Value, ApiError> {
            let prev = doc.export_checkpoints.get(STREAM).cloned();
            // The provider roster is a reconciliation snapshot, not a
            // timestamped event stream, so `since` has no effect here.
            let providers: Vec<serde_json::Value> = doc
                .liquidity_registry
                .providers()
                .map(|p| serde_json::to_value(p).expect("provider always serializes"))
                .collect();
            let total_filtered = providers.len();
            let page: Vec<_> = providers.into_iter().take(limit).collect();
            let next_cursor = if total_filtered > limit {
                Some(page.len().to_string())
            } else {
                None
            };
            let filters = serde_json::json!({ "since": query.since });

            let (export_page, record) = build_signed_export(
                page,
                total_filtered,
                next_cursor,
                filters,
                prev.as_ref(),
                &claim,
                now,
                ttl,
                &state.keys,
            )?;

            doc.export_checkpoints.insert(STREAM.to_string(), record);
            Ok(serde_json::to_value(&export_page).expect("export page always serializes"))
        })
        .await?;

    Ok(Json(result))
}
