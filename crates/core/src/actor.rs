//! Identity primitives shared across the marketplace: actors carry no
//! ownership semantics of their own, only a type and an id.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    User,
    Partner,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    #[serde(rename = "type")]
    pub actor_type: ActorType,
    pub id: String,
}

impl ActorRef {
    pub fn new(actor_type: ActorType, id: impl Into<String>) -> Self {
        Self {
            actor_type,
            id: id.into(),
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(ActorType::User, id)
    }

    pub fn partner(id: impl Into<String>) -> Self {
        Self::new(ActorType::Partner, id)
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self::new(ActorType::Agent, id)
    }

    /// Stable composite key used for idempotency scoping and spend-cap
    /// bucketing: `"{type}:{id}"`.
    pub fn key(&self) -> String {
        let t = match self.actor_type {
            ActorType::User => "user",
            ActorType::Partner => "partner",
            ActorType::Agent => "agent",
        };
        format!("{t}:{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_and_type_qualified() {
        let a = ActorRef::user("u1");
        let b = ActorRef::partner("u1");
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), "user:u1");
    }

    #[test]
    fn serializes_type_tag_lowercase() {
        let a = ActorRef::agent("bot-1");
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "agent");
        assert_eq!(json["id"], "bot-1");
    }
}
