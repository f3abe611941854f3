use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use swapgraph_core::export::{build_signed_export, ContinuationClaim};

use crate::error::ApiError;
use crate::extractors::{ActorContextExtractor, IdempotencyKey};
use crate::handlers::idempotent;
use crate::models::ExportQuery;
use crate::state::AppState;

const STREAM: &str = "transparency_log";

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct AppendBatchRequest {
    pub publication_id: String,
    pub source_type: String,
    pub entries: Vec<serde_json::Value>,
}

pub async fn append(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Json(req): Json<AppendBatchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_scopes(&["transparency.write"])?;
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let result = idempotent(&state, "transparency.append", actor, &idem_key, &body, move |doc| {
        let batch = doc
            .transparency_log
            .append_batch(req.publication_id.clone(), req.source_type.clone(), req.entries.clone(), now);
        Ok(batch.clone())
    })
    .await?;
    Ok(Json(result))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let batches = state.store.read(|doc| doc.transparency_log.batches().to_vec()).await;
    Ok(Json(serde_json::json!({ "batches": batches })))
}

pub async fn export(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    Query(query): Query<ExportQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_scopes(&["transparency.export"])?;
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
            let filtered: Vec<_> = doc
                .transparency_log
                .batches()
                .iter()
                .filter(|b| query.since.map(|since| b.published_at >= since).unwrap_or(true))
                .cloned()
                .collect();
            let total_filtered = filtered.len();
            let page: Vec<_> = filtered.into_iter().take(limit).collect();
            let next_cursor = if total_filtered > limit {
                page.last().map(|b: &swapgraph_ledger::PublicationBatch| b.publication_index.to_string())
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
