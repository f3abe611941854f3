use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use swapgraph_core::export::{build_signed_export, ContinuationClaim};

use crate::error::ApiError;
use crate::extractors::ActorContextExtractor;
use crate::models::ExportQuery;
use crate::state::AppState;

const STREAM: &str = "policy_audit";

pub async fn list(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_scopes(&["policy_audit.read"])?;
    let entries = state
        .store
        .read(|doc| doc.policy.audit_log.entries().to_vec())
        .await;
    Ok(Json(serde_json::json!({ "entries": entries })))
}

pub async fn export(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    Query(query): Query<ExportQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_scopes(&["policy_audit.export"])?;
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
            let all = doc.policy.audit_log.entries();
            let filtered: Vec<_> = all
                .iter()
                .filter(|e| query.since.map(|since| e.occurred_at >= since).unwrap_or(true))
                .cloned()
                .collect();
            let total_filtered = filtered.len();
            let page: Vec<_> = filtered.into_iter().take(limit).collect();
            let next_cursor = if total_filtered > limit {
                page.last().map(|e: &swapgraph_policy::PolicyAuditEntry| e.sequence_number.to_string())
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
