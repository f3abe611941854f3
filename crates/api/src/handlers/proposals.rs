use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use swapgraph_marketplace::auth::enforce_partner_scope;
use swapgraph_marketplace::commit::{accept, create_commit, decline, expire_accept_phase};

use crate::error::ApiError;
use crate::extractors::{ActorContextExtractor, IdempotencyKey};
use crate::handlers::idempotent;
use crate::state::AppState;

fn participant_ids(proposal: &swapgraph_marketplace::entities::CycleProposal) -> Vec<String> {
    proposal.participants.iter().map(|p| p.from.id.clone()).collect()
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
) -> Result<Json<serde_json::Value>, ApiError> {
    let proposals = state
        .store
        .read(|doc| {
            doc.proposals
                .values()
                .filter(|p| enforce_partner_scope(&ctx, p.partner_id.as_deref(), &participant_ids(p)).is_ok())
                .cloned()
                .collect::<Vec<_>>()
        })
        .await;
    Ok(Json(serde_json::json!({ "proposals": proposals })))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    Path(proposal_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let proposal = state
        .store
        .read(|doc| doc.proposals.get(&proposal_id).cloned())
        .await
        .ok_or_else(|| swapgraph_core::AppError::not_found(format!("no proposal {proposal_id}")))?;
    enforce_partner_scope(&ctx, proposal.partner_id.as_deref(), &participant_ids(&proposal))?;
    Ok(Json(serde_json::to_value(&proposal).map_err(|e| anyhow::anyhow!(e))?))
}

/// Accept a proposal on behalf of the calling actor. Lazily creates the
/// commit record on first acceptance.
pub async fn accept_proposal(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(proposal_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::json!({ "proposal_id": proposal_id, "actor": ctx.actor.key() });
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let result = idempotent(
        &state,
        &format!("proposals.accept:{proposal_id}"),
        actor.clone(),
        &idem_key,
        &body,
        move |doc| {
            let proposal = doc.proposals.get(&proposal_id).cloned().ok_or_else(|| {
                swapgraph_marketplace::MarketplaceError::NotFound(format!(
                    "no proposal {proposal_id}"
                ))
            })?;
            enforce_partner_scope(&ctx, proposal.partner_id.as_deref(), &participant_ids(&proposal))?;
            let commit_id = swapgraph_marketplace::commit::commit_id_for_proposal(&proposal.id);
            let mut commit = doc
                .commits
                .get(&commit_id)
                .cloned()
                .unwrap_or_else(|| create_commit(&proposal, now));
            let committed = accept(&mut commit, &proposal, &actor, &mut doc.reservations, now)?;
            doc.commits.insert(commit.id.clone(), commit.clone());
            if committed {
                if let Some(p) = doc.proposals.get_mut(&proposal_id) {
                    p.status = swapgraph_marketplace::entities::ProposalStatus::Superseded;
                }
            }
            Ok(commit)
        },
    )
    .await?;
    Ok(Json(result))
}

/// Sweep a proposal's commit out of `Accepting` once the proposal's own
/// live window has lapsed. A no-op if the commit already moved on.
pub async fn expire_proposal(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(proposal_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::json!({ "proposal_id": proposal_id });
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let result = idempotent(
        &state,
        &format!("proposals.expire:{proposal_id}"),
        actor,
        &idem_key,
        &body,
        move |doc| {
            let proposal = doc.proposals.get(&proposal_id).cloned().ok_or_else(|| {
                swapgraph_marketplace::MarketplaceError::NotFound(format!(
                    "no proposal {proposal_id}"
                ))
            })?;
            let commit_id = swapgraph_marketplace::commit::commit_id_for_proposal(&proposal.id);
            let commit = doc.commits.get_mut(&commit_id).ok_or_else(|| {
                swapgraph_marketplace::MarketplaceError::NotFound(format!(
                    "no commit for proposal {proposal_id}"
                ))
            })?;
            expire_accept_phase(commit, &proposal, now);
            Ok(commit.clone())
        },
    )
    .await?;
    Ok(Json(result))
}

pub async fn decline_proposal(
    State(state): State<Arc<AppState>>,
    ActorContextExtractor(ctx): ActorContextExtractor,
    IdempotencyKey(idem_key): IdempotencyKey,
    Path(proposal_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = serde_json::json!({ "proposal_id": proposal_id, "actor": ctx.actor.key() });
    let now = ctx.now;
    let actor = ctx.actor.clone();
    let result = idempotent(
        &state,
        &format!("proposals.decline:{proposal_id}"),
        actor.clone(),
        &idem_key,
        &body,
        move |doc| {
            let proposal = doc.proposals.get(&proposal_id).cloned().ok_or_else(|| {
                swapgraph_marketplace::MarketplaceError::NotFound(format!(
                    "no proposal {proposal_id}"
                ))
            })?;
            enforce_partner_scope(&ctx, proposal.partner_id.as_deref(), &participant_ids(&proposal))?;
            let commit_id = swapgraph_marketplace::commit::commit_id_for_proposal(&proposal.id);
            let mut commit = doc
                .commits
                .get(&commit_id)
                .cloned()
                .unwrap_or_else(|| create_commit(&proposal, now));
            decline(&mut commit, &proposal, &actor, &mut doc.reservations, now)?;
            doc.commits.insert(commit.id.clone(), commit.clone());
            Ok(commit)
        },
    )
    .await?;
    Ok(Json(result))
}
