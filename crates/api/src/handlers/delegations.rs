use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use swapgraph_core::ActorRef;
use swapgraph_policy::delegation::{mint_delegation_token, ConsentRequirements, Delegation};
use swapgraph_store::{derive_event_id, EventEnvelope};

use crate::error::ApiError;
use crate::extractors::{ActorContextExtractor, IdempotencyKey};
use crate::models::CreateDelegationRequest;
use crate::state::AppState;

/// Mint a delegation token on behalf of the calling actor (the owner)
/// naming `subject_actor_id` as the delegate. Needs `&state.keys` to sign,
/// so this runs the manual pre-check/write pattern rather than the shared
/// `idempotent()` helper.
pub async fn create(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Json(req): Json<CreateDelegationRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::to_value(&req).map_err(|e| anyhow::anyhow!(e))?;
    let actor = ctx.actor.clone();
    let key = swapgraph_store::ScopeKey::new("delegations.create", idem_key.clone());
    let fingerprint = swapgraph_store::IdempotencyLedger::fingerprint(&body);

    if let swapgraph_store::IdempotencyOutcome::Replay(record) =
        state.store.read(|doc| doc.idempotency.check(&key, &fingerprint)).await
    {
        return Ok(Json(record.result_body));
    }

    let delegation = Delegation {
        delegation_id: req.delegation_id.clone(),
        owner_actor: ctx.actor.clone(),
        subject_actor: ActorRef::agent(req.subject_actor_id.clone()),
        scopes: req.scopes.clone(),
        operation_allowlist: req.operation_allowlist.clone(),
        expires_at: req.expires_at,
        spend_cap_per_day_usd: req.spend_cap_per_day_usd,
        consent_requirements: ConsentRequirements {
            require_consent: req.require_consent,
            require_signature: req.require_consent,
            require_challenge: false,
        },
    };
    let now = ctx.now;
    let nonce = swapgraph_core::canonical::sha256_canonical(&(&req.delegation_id, "mint"))
        .expect("tuple always serializes");
    let keys = &state.keys;
    let token = mint_delegation_token(delegation, nonce, now, keys)?;

    let result = state
        .store
        .with_write(|doc| -> Result<serde_json::Value, swapgraph_marketplace::MarketplaceError> {
            doc.delegations.insert(req.delegation_id.clone(), token.clone());
            let body = serde_json::to_value(&token).expect("token always serializes");
            doc.idempotency
                .record(key.clone(), fingerprint.clone(), 200, body.clone(), now);
            let event_id = derive_event_id("delegations.create", &idem_key, &body);
            doc.outbox.append(EventEnvelope {
                event_id,
                event_type: "delegations.create".to_string(),
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

pub async fn get(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    Path(delegation_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = state
        .store
        .read(|doc| doc.delegations.get(&delegation_id).cloned())
        .await
        .ok_or_else(|| swapgraph_core::AppError::not_found(format!("no delegation {delegation_id}")))?;
    if token.delegation.owner_actor.id != ctx.actor.id && token.delegation.subject_actor.id != ctx.actor.id {
        return Err(swapgraph_core::AppError::forbidden("not a party to this delegation").into());
    }
    Ok(Json(serde_json::to_value(&token).map_err(|e| anyhow::anyhow!(e))?))
}
