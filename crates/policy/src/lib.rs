//! Delegation & Policy (C11): delegation tokens, consent proofs with
//! replay/challenge binding, daily spend caps, and an append-only
//! policy-audit log exported through the shared signed-export framework.

pub mod audit;
pub mod consent;
pub mod delegation;
pub mod error;
pub mod evaluate;
pub mod spend_cap;

pub use audit::{PolicyAuditEntry, PolicyAuditLog, PolicyDecision};
pub use consent::{verify_consent, ConsentProof, ConsentVerificationConfig};
pub use delegation::{
    mint_delegation_token, parse_delegation_token, ConsentRequirements, Delegation,
    DelegationToken,
};
pub use error::PolicyError;
pub use evaluate::{evaluate_operation, EvaluationRequest, PolicyEngineState};
pub use spend_cap::SpendCapTracker;
