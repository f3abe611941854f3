use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use swapgraph_marketplace::auth::enforce_partner_scope;
use swapgraph_marketplace::entities::IntentStatus;
use swapgraph_marketplace::intents::{
    cancel_intent, create_intent, update_intent, CreateIntentParams, UpdateIntentParams,
};
use swapgraph_policy::delegation::parse_delegation_token;
use swapgraph_policy::evaluate::{evaluate_operation, EvaluationRequest};

use crate::error::ApiError;
use crate::extractors::{ActorContextExtractor, DelegationBearer, IdempotencyKey};
use crate::handlers::idempotent;
use crate::models::{CancelIntentRequest, CreateIntentRequest, UpdateIntentRequest};
use crate::state::AppState;

const CANCEL_OPERATION_ID: &str = "swapIntents.cancel";

fn cancel_required_scopes() -> Vec<String> {
    vec!["intents.write".to_string()]
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Json(req): Json<CreateIntentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let result = idempotent(&state, "intents.create", actor.clone(), &idem_key, &body, move |doc| {
        let intent = create_intent(
            CreateIntentParams {
                id: req.id,
                partner_id: req.partner_id,
                actor,
                offer: req.offer,
                want_spec: req.want_spec,
                value_band: req.value_band,
                trust_constraints: req.trust_constraints,
                time_constraints: req.time_constraints,
                settlement_preferences: req.settlement_preferences,
            },
            now,
        )?;
        doc.intents.insert(intent.id.clone(), intent.clone());
        Ok(intent)
    })
    .await?;
    Ok(Json(result))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    Path(intent_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let intent = state
        .store
        .read(|doc| doc.intents.get(&intent_id).cloned())
        .await
        .ok_or_else(|| swapgraph_core::AppError::not_found(format!("no intent {intent_id}")))?;
    enforce_partner_scope(&ctx, intent.partner_id.as_deref(), &[intent.actor.id.clone()])?;
    Ok(Json(serde_json::to_value(&intent).map_err(|e| anyhow::anyhow!(e))?))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
) -> Result<Json<serde_json::Value>, ApiError> {
    let intents = state
        .store
        .read(|doc| {
            doc.intents
                .values()
                .filter(|intent| {
                    enforce_partner_scope(&ctx, intent.partner_id.as_deref(), &[intent.actor.id.clone()])
                        .is_ok()
                })
                .cloned()
                .collect::<Vec<_>>()
        })
        .await;
    Ok(Json(serde_json::json!({ "intents": intents })))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(intent_id): Path<String>,
    Json(req): Json<UpdateIntentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let result = idempotent(
        &state,
        &format!("intents.update:{intent_id}"),
        actor,
        &idem_key,
        &body,
        move |doc| {
            let intent = doc.intents.get_mut(&intent_id).ok_or_else(|| {
                swapgraph_marketplace::MarketplaceError::NotFound(format!(
                    "no intent {intent_id}"
                ))
            })?;
            enforce_partner_scope(&ctx, intent.partner_id.as_deref(), &[intent.actor.id.clone()])?;
            update_intent(
                intent,
                UpdateIntentParams {
                    value_band: req.value_band,
                    time_constraints: req.time_constraints,
                    trust_constraints: req.trust_constraints,
                },
                now,
            )?;
            Ok(intent.clone())
        },
    )
    .await?;
    Ok(Json(result))
}

/// Cancel a swap intent. When `authorization` carries a delegation bearer,
/// the cancel is treated as an agent acting on a user's behalf: the bearer
/// is looked up as a `delegation_id`, the bound token is verified, and the
/// resulting delegation is run through policy evaluation (scope, operation
/// allowlist, consent, spend cap) before the cancel is allowed to proceed.
/// A direct cancel with no bearer skips delegation enforcement entirely.
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    DelegationBearer(bearer): DelegationBearer,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(intent_id): Path<String>,
    Json(req): Json<CancelIntentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::json!({ "intent_id": intent_id, "consent": req.consent });
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let consent_config = state.consent_config;
    let registry = &state.keys;
    let audit_id = idem_key.clone();
    let required_scopes = cancel_required_scopes();
    let result = idempotent(
        &state,
        "intents.cancel",
        actor.clone(),
        &idem_key,
        &body,
        move |doc| {
            if let Some(delegation_id) = &bearer {
                let token = doc.delegations.get(delegation_id).cloned().ok_or_else(|| {
                    swapgraph_marketplace::MarketplaceError::NotFound(format!(
                        "no delegation {delegation_id}"
                    ))
                })?;
                let delegation = parse_delegation_token(&token, now, registry)?;
                evaluate_operation(
                    &mut doc.policy,
                    EvaluationRequest {
                        audit_id,
                        operation_id: CANCEL_OPERATION_ID,
                        actor: actor.clone(),
                        required_scopes: &required_scopes,
                        delegation: &delegation,
                        consent: req.consent.as_ref(),
                        committed_value_usd: None,
                        now,
                    },
                    registry,
                    consent_config,
                )?;
            }

            let reservations = doc.reservations.clone();
            let intent = doc.intents.get_mut(&intent_id).ok_or_else(|| {
                swapgraph_marketplace::MarketplaceError::NotFound(format!(
                    "no intent {intent_id}"
                ))
            })?;
            if intent.status == IntentStatus::Cancelled {
                return Ok(intent.clone());
            }
            enforce_partner_scope(&ctx, intent.partner_id.as_deref(), &[intent.actor.id.clone()])?;
            cancel_intent(intent, &reservations, now)?;
            Ok(intent.clone())
        },
    )
    .await?;
    Ok(Json(result))
}
