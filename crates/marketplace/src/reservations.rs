//! Reservation tracking: `intent_id -> proposal_id`, exclusive. Enforces
//! "no intent is reserved by two live proposals" (spec invariant i).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::Reservation;
use crate::error::MarketplaceError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservationBook {
    by_intent: HashMap<String, String>,
}

impl ReservationBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reserved(&self, intent_id: &str) -> bool {
        self.by_intent.contains_key(intent_id)
    }

    pub fn proposal_for(&self, intent_id: &str) -> Option<&str> {
        self.by_intent.get(intent_id).map(String::as_str)
    }

    /// Reserve `intent_id` for `proposal_id`. Fails `CONFLICT` if the
    /// intent is already reserved by a different (live) proposal.
    pub fn reserve(&mut self, intent_id: &str, proposal_id: &str) -> Result<(), MarketplaceError> {
        if let Some(existing) = self.by_intent.get(intent_id) {
            if existing != proposal_id {
                return Err(MarketplaceError::Conflict(format!(
                    "intent {intent_id} already reserved by proposal {existing}"
                )));
            }
            return Ok(());
        }
        self.by_intent.insert(intent_id.to_string(), proposal_id.to_string());
        Ok(())
    }

    pub fn release(&mut self, intent_id: &str) {
        self.by_intent.remove(intent_id);
    }

    pub fn release_for_proposal(&mut self, proposal_id: &str) {
        self.by_intent.retain(|_, p| p != proposal_id);
    }

    pub fn reservations(&self) -> Vec<Reservation> {
        self.by_intent
            .iter()
            .map(|(intent_id, proposal_id)| Reservation {
                intent_id: intent_id.clone(),
                proposal_id: proposal_id.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_intent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_intent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserving_for_a_different_proposal_conflicts() {
        let mut book = ReservationBook::new();
        book.reserve("i1", "p1").unwrap();
        let err = book.reserve("i1", "p2").unwrap_err();
        assert!(matches!(err, MarketplaceError::Conflict(_)));
    }

    #[test]
    fn reserving_for_the_same_proposal_twice_is_a_no_op() {
        let mut book = ReservationBook::new();
        book.reserve("i1", "p1").unwrap();
        book.reserve("i1", "p1").unwrap();
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn release_frees_the_intent_for_reservation() {
        let mut book = ReservationBook::new();
        book.reserve("i1", "p1").unwrap();
        book.release("i1");
        book.reserve("i1", "p2").unwrap();
        assert_eq!(book.proposal_for("i1"), Some("p2"));
    }
}
