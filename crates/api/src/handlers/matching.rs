use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use swapgraph_marketplace::entities::IntentStatus;
use swapgraph_marketplace::matcher::run_matching;

use crate::error::ApiError;
use crate::extractors::{ActorContextExtractor, IdempotencyKey};
use crate::handlers::idempotent;
use crate::models::CreateMatchingRunRequest;
use crate::state::AppState;

pub async fn create(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Json(req): Json<CreateMatchingRunRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let matcher_config = state.matcher.clone();
    let engine_version = req.engine_version.clone().unwrap_or_else(|| "v2".to_string());
    let partner_id = req.partner_id.clone();
    let idem_key_for_run = idem_key.clone();

    let canary = state.canary.lock().await.clone();

    let result = idempotent(&state, "matching.create", actor, &idem_key, &body, move |doc| {
        let mut counter = 0u64;
        let run_seed = idem_key_for_run.clone();
        let intents: Vec<_> = doc
            .intents
            .values()
            .filter(|i| {
                i.status == IntentStatus::Active
                    && i.partner_id.as_deref() == partner_id.as_deref()
            })
            .collect();

        let result = run_matching(
            &intents,
            partner_id.as_deref(),
            &matcher_config,
            &canary,
            &engine_version,
            now,
            || {
                counter += 1;
                swapgraph_core::canonical::sha256_canonical(&(run_seed.clone(), counter))
                    .expect("tuple always serializes")
            },
        );

        for proposal in &result.proposals {
            doc.proposals.insert(proposal.id.clone(), proposal.clone());
        }
        doc.matching_runs
            .insert(result.run.run_id.clone(), result.run.clone());
        Ok(result.run)
    })
    .await?;
    Ok(Json(result))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let run = state
        .store
        .read(|doc| doc.matching_runs.get(&run_id).cloned())
        .await
        .ok_or_else(|| swapgraph_core::AppError::not_found(format!("no matching run {run_id}")))?;
    Ok(Json(serde_json::to_value(&run).map_err(|e| anyhow::anyhow!(e))?))
}
