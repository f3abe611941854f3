//! Request envelope parsing: `x-actor-type`/`x-actor-id`/`x-auth-scopes`/
//! `x-now-iso` into an `ActorContext`, plus the write-path headers
//! (`idempotency-key`, `authorization: Bearer <delegation-token>`).

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use swapgraph_core::{ActorRef, ActorType};
use swapgraph_marketplace::auth::ActorContext;

use crate::error::ApiError;

const HEADER_ACTOR_TYPE: &str = "x-actor-type";
const HEADER_ACTOR_ID: &str = "x-actor-id";
const HEADER_SCOPES: &str = "x-auth-scopes";
const HEADER_NOW: &str = "x-now-iso";
const HEADER_IDEMPOTENCY_KEY: &str = "idempotency-key";

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn missing(name: &str) -> ApiError {
    swapgraph_core::AppError::validation(format!("missing required header: {name}")).into()
}

pub struct ActorContextExtractor(pub ActorContext);

#[async_trait]
impl<S> FromRequestParts<S> for ActorContextExtractor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor_type_raw =
            header_str(parts, HEADER_ACTOR_TYPE).ok_or_else(|| missing(HEADER_ACTOR_TYPE))?;
        let actor_type = match actor_type_raw {
            "user" => ActorType::User,
            "partner" => ActorType::Partner,
            "agent" => ActorType::Agent,
            other => {
                return Err(swapgraph_core::AppError::validation(format!(
                    "unrecognized actor type: {other}"
                ))
                .into())
            }
        };
        let actor_id = header_str(parts, HEADER_ACTOR_ID).ok_or_else(|| missing(HEADER_ACTOR_ID))?;
        let actor = ActorRef::new(actor_type, actor_id);

        let scopes = header_str(parts, HEADER_SCOPES)
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let now = match header_str(parts, HEADER_NOW) {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| {
                    swapgraph_core::AppError::validation(format!(
                        "invalid {HEADER_NOW} header: not RFC3339"
                    ))
                })?,
            None => Utc::now(),
        };

        Ok(Self(ActorContext::new(actor, scopes, now)))
    }
}

/// `idempotency-key`, required on every state-mutating operation.
pub struct IdempotencyKey(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_str(parts, HEADER_IDEMPOTENCY_KEY)
            .map(|s| Self(s.to_string()))
            .ok_or_else(|| missing(HEADER_IDEMPOTENCY_KEY))
    }
}

/// `authorization: Bearer <delegation-token>`, required whenever an agent
/// acts under a user's delegation.
pub struct DelegationBearer(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for DelegationBearer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = header_str(parts, "authorization").and_then(|raw| {
            raw.strip_prefix("Bearer ")
                .map(|token| token.trim().to_string())
        });
        Ok(Self(token))
    }
}
