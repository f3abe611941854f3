pub mod delegations;
pub mod health;
pub mod intents;
pub mod keys;
pub mod liquidity;
pub mod matching;
pub mod policy_audit;
pub mod proposals;
pub mod settlement;
pub mod transparency;
pub mod vault;

use chrono::Utc;
use serde_json::Value;
use swapgraph_core::ActorRef;
use swapgraph_store::{derive_event_id, EventEnvelope, IdempotencyOutcome, ScopeKey};

use crate::error::ApiError;
use crate::state::AppState;

/// The common idempotent-write shape every mutating handler runs through:
/// check the ledger for a replay or conflict before the operation, record
/// the serialized result after it, and append exactly one outbox event for
/// the mutation (deduped by `event_id`, so a retried write is a no-op on
/// the event log too). `f` runs inside the same `with_write` critical
/// section the idempotency and outbox bookkeeping runs in.
pub async fn idempotent<F, T>(
    state: &AppState,
    scope: &str,
    actor: ActorRef,
    idempotency_key: &str,
    request_body: &Value,
    f: F,
) -> Result<Value, ApiError>
where
    F: FnOnce(&mut swapgraph_marketplace::MarketplaceState) -> Result<T, swapgraph_marketplace::MarketplaceError>
        + Send,
    T: serde::Serialize + Send,
{
    let key = ScopeKey::new(scope, idempotency_key);
    let fingerprint = swapgraph_store::IdempotencyLedger::fingerprint(request_body);

    let outcome = state
        .store
        .read(|doc| doc.idempotency.check(&key, &fingerprint))
        .await;

    match outcome {
        IdempotencyOutcome::Replay(record) => return Ok(record.result_body),
        IdempotencyOutcome::Conflict => {
            return Err(swapgraph_core::AppError::idempotency_conflict(
                "idempotency-key reused with a different request body",
            )
            .into())
        }
        IdempotencyOutcome::Fresh => {}
    }

    let correlation_id = idempotency_key.to_string();
    let scope = scope.to_string();
    let body = state
        .store
        .with_write(|doc| -> Result<Value, swapgraph_marketplace::MarketplaceError> {
            let now = Utc::now();
            let result = f(doc)?;
            let body = serde_json::to_value(&result).expect("result always serializes");
            doc.idempotency
                .record(key.clone(), fingerprint.clone(), 200, body.clone(), now);
            let event_id = derive_event_id(&scope, &correlation_id, &body);
            doc.outbox.append(EventEnvelope {
                event_id,
                event_type: scope.clone(),
                occurred_at: now,
                actor: actor.clone(),
                correlation_id: correlation_id.clone(),
                payload: body.clone(),
            });
            Ok(body)
        })
        .await
        .map_err(ApiError::from)?;

    Ok(body)
}
