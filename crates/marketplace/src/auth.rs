//! Auth & Tenancy (C5): actor/scope context carried on every request, and
//! the partner-scoping rule proposals and cycles are read/written under.

use chrono::{DateTime, Utc};
use swapgraph_core::{ActorRef, ActorType};

use crate::error::MarketplaceError;

/// Parsed from the request envelope headers (`x-actor-type`, `x-actor-id`,
/// `x-auth-scopes`, optional `x-now-iso` for deterministic tests).
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub actor: ActorRef,
    pub scopes: Vec<String>,
    pub now: DateTime<Utc>,
}

impl ActorContext {
    pub fn new(actor: ActorRef, scopes: Vec<String>, now: DateTime<Utc>) -> Self {
        Self { actor, scopes, now }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// `INSUFFICIENT_SCOPE` if any of `required` is missing.
    pub fn require_scopes(&self, required: &[&str]) -> Result<(), MarketplaceError> {
        for scope in required {
            if !self.has_scope(scope) {
                return Err(MarketplaceError::Forbidden(format!(
                    "missing required scope: {scope}"
                )));
            }
        }
        Ok(())
    }
}

/// Partner tenancy on a resource that carries a `partner_id`: non-partner
/// actors may read only if they're a listed participant; partner actors
/// may read/write only within their own `partner_id`.
pub fn enforce_partner_scope(
    ctx: &ActorContext,
    resource_partner_id: Option<&str>,
    participant_ids: &[String],
) -> Result<(), MarketplaceError> {
    match ctx.actor.actor_type {
        ActorType::Partner => match resource_partner_id {
            Some(partner_id) if partner_id == ctx.actor.id => Ok(()),
            _ => Err(MarketplaceError::Forbidden(
                "partner scope mismatch".to_string(),
            )),
        },
        _ => {
            if participant_ids.iter().any(|id| id == &ctx.actor.id) {
                Ok(())
            } else {
                Err(MarketplaceError::Forbidden(
                    "actor is not a participant".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partner_actor_limited_to_own_partner_id() {
        let ctx = ActorContext::new(ActorRef::partner("p1"), vec![], Utc::now());
        assert!(enforce_partner_scope(&ctx, Some("p1"), &[]).is_ok());
        assert!(enforce_partner_scope(&ctx, Some("p2"), &[]).is_err());
    }

    #[test]
    fn user_actor_requires_participation() {
        let ctx = ActorContext::new(ActorRef::user("u1"), vec![], Utc::now());
        assert!(enforce_partner_scope(&ctx, Some("p1"), &["u1".to_string()]).is_ok());
        assert!(enforce_partner_scope(&ctx, Some("p1"), &["u2".to_string()]).is_err());
    }

    #[test]
    fn missing_scope_is_forbidden() {
        let ctx = ActorContext::new(ActorRef::user("u1"), vec!["intents.read".to_string()], Utc::now());
        assert!(ctx.require_scopes(&["intents.read"]).is_ok());
        assert!(ctx.require_scopes(&["intents.write"]).is_err());
    }
}
