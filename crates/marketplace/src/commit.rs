//! Commit Service (C8): accept/decline/expire-accept-phase over a live
//! cycle proposal, with an atomic all-or-nothing reservation on full
//! acceptance.

use chrono::{DateTime, Utc};
use swapgraph_core::{canonical::sha256_canonical, ActorRef};

use crate::entities::{Commit, CommitPhase, CycleProposal};
use crate::error::MarketplaceError;
use crate::reservations::ReservationBook;

/// Deterministic so re-deriving it for the same proposal always agrees,
/// and so a replayed `create_commit` call is naturally idempotent.
pub fn commit_id_for_proposal(proposal_id: &str) -> String {
    sha256_canonical(&proposal_id).expect("a string always serializes")
}

pub fn create_commit(proposal: &CycleProposal, now: DateTime<Utc>) -> Commit {
    Commit {
        id: commit_id_for_proposal(&proposal.id),
        proposal_id: proposal.id.clone(),
        phase: CommitPhase::Accepting,
        acceptances: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

fn participant_actors(proposal: &CycleProposal) -> Vec<&ActorRef> {
    proposal.participants.iter().map(|p| &p.from).collect()
}

/// Record `actor`'s acceptance. Returns `true` once this call completes
/// the full acceptance set and commits the cycle (reserving every
/// participating intent atomically); `false` if acceptance is still
/// partial.
pub fn accept(
    commit: &mut Commit,
    proposal: &CycleProposal,
    actor: &ActorRef,
    reservations: &mut ReservationBook,
    now: DateTime<Utc>,
) -> Result<bool, MarketplaceError> {
    if commit.phase == CommitPhase::Expired {
        return Err(MarketplaceError::Expired);
    }
    if commit.phase != CommitPhase::Accepting {
        return Err(MarketplaceError::Conflict(format!(
            "commit {} is no longer accepting (phase {:?})",
            commit.id, commit.phase
        )));
    }
    if !proposal.is_live(now) {
        commit.phase = CommitPhase::Expired;
        commit.updated_at = now;
        return Err(MarketplaceError::Expired);
    }

    let participants = participant_actors(proposal);
    if !participants.iter().any(|p| *p == actor) {
        return Err(MarketplaceError::Forbidden(format!(
            "actor {} is not a participant in proposal {}",
            actor.key(),
            proposal.id
        )));
    }

    if !commit.acceptances.iter().any(|a| a == actor) {
        commit.acceptances.push(actor.clone());
        commit.updated_at = now;
    }

    let fully_accepted = participants
        .iter()
        .all(|p| commit.acceptances.iter().any(|a| &a == p));
    if !fully_accepted {
        return Ok(false);
    }

    let mut reserved = Vec::with_capacity(proposal.participants.len());
    for participant in &proposal.participants {
        match reservations.reserve(&participant.intent_id, &proposal.id) {
            Ok(()) => reserved.push(participant.intent_id.clone()),
            Err(err) => {
                for intent_id in &reserved {
                    reservations.release(intent_id);
                }
                return Err(err);
            }
        }
    }

    commit.phase = CommitPhase::Committed;
    commit.updated_at = now;
    Ok(true)
}

/// Any participant may decline while the commit is still accepting,
/// unwinding it permanently and releasing any reservations already held
/// under this proposal.
pub fn decline(
    commit: &mut Commit,
    proposal: &CycleProposal,
    actor: &ActorRef,
    reservations: &mut ReservationBook,
    now: DateTime<Utc>,
) -> Result<(), MarketplaceError> {
    if commit.phase == CommitPhase::Declined {
        return Ok(());
    }
    if commit.phase != CommitPhase::Accepting {
        return Err(MarketplaceError::Conflict(format!(
            "commit {} is no longer accepting (phase {:?})",
            commit.id, commit.phase
        )));
    }
    let participants = participant_actors(proposal);
    if !participants.iter().any(|p| *p == actor) {
        return Err(MarketplaceError::Forbidden(format!(
            "actor {} is not a participant in proposal {}",
            actor.key(),
            proposal.id
        )));
    }

    reservations.release_for_proposal(&proposal.id);
    commit.phase = CommitPhase::Declined;
    commit.updated_at = now;
    Ok(())
}

/// Swept periodically: transitions an `Accepting` commit whose proposal
/// has expired into `Expired`. Returns whether a transition happened.
pub fn expire_accept_phase(
    commit: &mut Commit,
    proposal: &CycleProposal,
    now: DateTime<Utc>,
) -> bool {
    if commit.phase == CommitPhase::Accepting && !proposal.is_live(now) {
        commit.phase = CommitPhase::Expired;
        commit.updated_at = now;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AssetDescriptor, ProposalParticipant, ProposalStatus};

    fn proposal(now: DateTime<Utc>) -> CycleProposal {
        CycleProposal {
            id: "p1".to_string(),
            partner_id: None,
            participants: vec![
                ProposalParticipant {
                    intent_id: "i1".to_string(),
                    from: ActorRef::user("u1"),
                    to: ActorRef::user("u2"),
                    asset_key: "steam:app1:ctx1:asset_a".to_string(),
                    value_usd: 100.0,
                },
                ProposalParticipant {
                    intent_id: "i2".to_string(),
                    from: ActorRef::user("u2"),
                    to: ActorRef::user("u1"),
                    asset_key: "steam:app1:ctx1:asset_b".to_string(),
                    value_usd: 101.0,
                },
            ],
            expires_at: now + chrono::Duration::hours(1),
            value_closure_delta: 1.0,
            status: ProposalStatus::Live,
            created_at: now,
        }
    }

    #[allow(dead_code)]
    fn asset() -> AssetDescriptor {
        AssetDescriptor {
            platform: "steam".to_string(),
            app_id: "app1".to_string(),
            context_id: "ctx1".to_string(),
            asset_id: "asset_a".to_string(),
            value_usd: 100.0,
            proof: None,
        }
    }

    #[test]
    fn commit_id_is_deterministic_for_the_same_proposal() {
        assert_eq!(commit_id_for_proposal("p1"), commit_id_for_proposal("p1"));
        assert_ne!(commit_id_for_proposal("p1"), commit_id_for_proposal("p2"));
    }

    #[test]
    fn full_acceptance_commits_and_reserves_all_intents() {
        let now = Utc::now();
        let proposal = proposal(now);
        let mut commit = create_commit(&proposal, now);
        let mut reservations = ReservationBook::new();

        let committed = accept(&mut commit, &proposal, &ActorRef::user("u1"), &mut reservations, now).unwrap();
        assert!(!committed);
        let committed = accept(&mut commit, &proposal, &ActorRef::user("u2"), &mut reservations, now).unwrap();
        assert!(committed);
        assert_eq!(commit.phase, CommitPhase::Committed);
        assert!(reservations.is_reserved("i1"));
        assert!(reservations.is_reserved("i2"));
    }

    #[test]
    fn non_participant_cannot_accept() {
        let now = Utc::now();
        let proposal = proposal(now);
        let mut commit = create_commit(&proposal, now);
        let mut reservations = ReservationBook::new();
        let err = accept(&mut commit, &proposal, &ActorRef::user("stranger"), &mut reservations, now).unwrap_err();
        assert!(matches!(err, MarketplaceError::Forbidden(_)));
    }

    #[test]
    fn decline_unwinds_and_releases_reservations() {
        let now = Utc::now();
        let proposal = proposal(now);
        let mut commit = create_commit(&proposal, now);
        let mut reservations = ReservationBook::new();
        accept(&mut commit, &proposal, &ActorRef::user("u1"), &mut reservations, now).unwrap();
        decline(&mut commit, &proposal, &ActorRef::user("u2"), &mut reservations, now).unwrap();
        assert_eq!(commit.phase, CommitPhase::Declined);
        assert!(!reservations.is_reserved("i1"));
    }

    #[test]
    fn expired_proposal_refuses_new_acceptances() {
        let now = Utc::now();
        let mut proposal = proposal(now);
        proposal.expires_at = now - chrono::Duration::minutes(1);
        let mut commit = create_commit(&proposal, now);
        let mut reservations = ReservationBook::new();
        let err = accept(&mut commit, &proposal, &ActorRef::user("u1"), &mut reservations, now).unwrap_err();
        assert!(matches!(err, MarketplaceError::Expired));
        assert_eq!(commit.phase, CommitPhase::Expired);
    }

    #[test]
    fn expire_accept_phase_is_a_noop_once_committed() {
        let now = Utc::now();
        let proposal = proposal(now);
        let mut commit = create_commit(&proposal, now);
        let mut reservations = ReservationBook::new();
        accept(&mut commit, &proposal, &ActorRef::user("u1"), &mut reservations, now).unwrap();
        accept(&mut commit, &proposal, &ActorRef::user("u2"), &mut reservations, now).unwrap();
        let later = now + chrono::Duration::hours(2);
        assert!(!expire_accept_phase(&mut commit, &proposal, later));
        assert_eq!(commit.phase, CommitPhase::Committed);
    }
}
