//! Settlement Engine (C9): the deposit/escrow/execution state machine
//! driving a committed cycle from `accepted` to `completed`, plus receipt
//! emission.
//!
//! State diagram: `accepted -> escrow.pending -> escrow.ready ->
//! executing -> completed`, with `escrow.pending` timing out to `failed`
//! if the deposit window lapses.

use chrono::{DateTime, Utc};
use swapgraph_core::signing::KeyRegistry;

use crate::entities::{
    Commit, CycleProposal, DepositMode, FinalState, LegStatus, Receipt, ReceiptTransparency,
    SettlementLeg, SettlementTimeline, TimelineState,
};
use crate::error::MarketplaceError;

/// Start a settlement timeline for a just-committed cycle. One leg per
/// participant, in `accepted` state with its own deposit deadline.
pub fn start(
    commit: &Commit,
    proposal: &CycleProposal,
    partner_id: Option<String>,
    deposit_window: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<SettlementTimeline, MarketplaceError> {
    if commit.phase != crate::entities::CommitPhase::Committed {
        return Err(MarketplaceError::Conflict(
            "settlement can only start from a committed commit".to_string(),
        ));
    }

    let legs = proposal
        .participants
        .iter()
        .map(|participant| SettlementLeg {
            intent_id: participant.intent_id.clone(),
            from_actor: participant.from.clone(),
            to_actor: participant.to.clone(),
            assets: vec![],
            status: LegStatus::Pending,
            deposit_mode: DepositMode::Deposit,
            deposit_deadline_at: now + deposit_window,
            deposit_ref: None,
        })
        .collect();

    Ok(SettlementTimeline {
        cycle_id: proposal.id.clone(),
        partner_id: partner_id.clone(),
        origin_partner_id: partner_id,
        state: TimelineState::Accepted,
        legs,
        updated_at: now,
    })
}

/// Every mutating settlement operation is tenancy-scoped the same way:
/// if `timeline.partner_id` was cleared out-of-band, a replay from the
/// *original* partner heals it back from `origin_partner_id`; a replay
/// from any other partner is refused without mutating anything.
fn enforce_tenancy(
    timeline: &mut SettlementTimeline,
    caller_partner_id: Option<&str>,
) -> Result<(), MarketplaceError> {
    match (&timeline.partner_id, caller_partner_id) {
        (Some(current), Some(caller)) if current == caller => Ok(()),
        (Some(current), Some(caller)) if current != caller => {
            Err(MarketplaceError::PartnerUnauthorized)
        }
        (None, Some(caller)) => {
            if timeline.origin_partner_id.as_deref() == Some(caller) {
                timeline.partner_id = Some(caller.to_string());
                Ok(())
            } else {
                Err(MarketplaceError::PartnerUnauthorized)
            }
        }
        (None, None) | (Some(_), None) => Ok(()),
    }
}

fn transition(
    timeline: &mut SettlementTimeline,
    caller_partner_id: Option<&str>,
    expected: TimelineState,
    next: TimelineState,
    now: DateTime<Utc>,
) -> Result<(), MarketplaceError> {
    enforce_tenancy(timeline, caller_partner_id)?;
    if timeline.state != expected {
        return Err(MarketplaceError::Conflict(format!(
            "cannot move from {:?} to {:?}; timeline is in {:?}",
            expected, next, timeline.state
        )));
    }
    timeline.state = next;
    timeline.updated_at = now;
    tracing::debug!(cycle_id = %timeline.cycle_id, from = ?expected, to = ?next, "settlement timeline transitioned");
    Ok(())
}

/// `accepted -> escrow.pending`.
pub fn request_deposits(
    timeline: &mut SettlementTimeline,
    caller_partner_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), MarketplaceError> {
    transition(
        timeline,
        caller_partner_id,
        TimelineState::Accepted,
        TimelineState::EscrowPending,
        now,
    )
}

/// Confirm one leg's deposit. Once every leg is deposited the timeline
/// advances to `escrow.ready`.
pub fn confirm_deposit(
    timeline: &mut SettlementTimeline,
    caller_partner_id: Option<&str>,
    intent_id: &str,
    deposit_ref: String,
    now: DateTime<Utc>,
) -> Result<(), MarketplaceError> {
    enforce_tenancy(timeline, caller_partner_id)?;
    if timeline.state != TimelineState::EscrowPending {
        return Err(MarketplaceError::Conflict(format!(
            "cannot confirm a deposit while timeline is in {:?}",
            timeline.state
        )));
    }
    let leg = timeline
        .legs
        .iter_mut()
        .find(|l| l.intent_id == intent_id)
        .ok_or_else(|| MarketplaceError::NotFound(format!("no leg for intent {intent_id}")))?;
    if leg.deposit_deadline_at <= now {
        return Err(MarketplaceError::DepositTimeout);
    }
    leg.status = LegStatus::Deposited;
    leg.deposit_ref = Some(deposit_ref);
    timeline.updated_at = now;

    if timeline.legs.iter().all(|l| l.status == LegStatus::Deposited) {
        timeline.state = TimelineState::EscrowReady;
    }
    tracing::debug!(cycle_id = %timeline.cycle_id, intent_id, state = ?timeline.state, "deposit confirmed");
    Ok(())
}

/// `escrow.ready -> executing`.
pub fn begin_execution(
    timeline: &mut SettlementTimeline,
    caller_partner_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), MarketplaceError> {
    transition(
        timeline,
        caller_partner_id,
        TimelineState::EscrowReady,
        TimelineState::Executing,
        now,
    )
}

/// Sweep: any leg whose deposit deadline lapses while still pending fails
/// the whole cycle with `deposit_timeout`, releasing already-deposited
/// legs back via `refund_pending_legs`.
pub fn expire_deposit_window(
    timeline: &mut SettlementTimeline,
    now: DateTime<Utc>,
) -> bool {
    if timeline.state != TimelineState::EscrowPending {
        return false;
    }
    let timed_out = timeline
        .legs
        .iter()
        .any(|l| l.status == LegStatus::Pending && l.deposit_deadline_at <= now);
    if !timed_out {
        return false;
    }
    for leg in timeline.legs.iter_mut() {
        if leg.status == LegStatus::Deposited {
            leg.status = LegStatus::Refunded;
        }
    }
    timeline.state = TimelineState::Failed;
    timeline.updated_at = now;
    tracing::debug!(cycle_id = %timeline.cycle_id, "deposit window expired, timeline failed");
    true
}

/// `executing -> completed`, releasing every leg and minting a signed
/// receipt. A caller can also complete straight into `failed` (e.g. an
/// adapter-reported execution error) via `fail`.
pub fn complete(
    timeline: &mut SettlementTimeline,
    caller_partner_id: Option<&str>,
    fees: Vec<serde_json::Value>,
    signer: &KeyRegistry,
    receipt_id: String,
    now: DateTime<Utc>,
) -> Result<Receipt, MarketplaceError> {
    enforce_tenancy(timeline, caller_partner_id)?;
    if timeline.state != TimelineState::Executing {
        return Err(MarketplaceError::Conflict(format!(
            "cannot complete from {:?}",
            timeline.state
        )));
    }
    for leg in timeline.legs.iter_mut() {
        leg.status = LegStatus::Released;
    }
    timeline.state = TimelineState::Completed;
    timeline.updated_at = now;
    tracing::debug!(cycle_id = %timeline.cycle_id, "settlement completed");

    build_receipt(timeline, FinalState::Completed, None, fees, signer, receipt_id)
}

/// Unwind a cycle mid-execution; used when an adapter call fails or the
/// cycle is otherwise unwound after commit.
pub fn fail(
    timeline: &mut SettlementTimeline,
    caller_partner_id: Option<&str>,
    reason_code: &str,
    signer: &KeyRegistry,
    receipt_id: String,
    now: DateTime<Utc>,
) -> Result<Receipt, MarketplaceError> {
    enforce_tenancy(timeline, caller_partner_id)?;
    if matches!(timeline.state, TimelineState::Completed | TimelineState::Failed) {
        return Err(MarketplaceError::Conflict(format!(
            "cannot fail a settlement already in {:?}",
            timeline.state
        )));
    }
    for leg in timeline.legs.iter_mut() {
        if leg.status == LegStatus::Deposited {
            leg.status = LegStatus::Refunded;
        }
    }
    timeline.state = TimelineState::Failed;
    timeline.updated_at = now;
    tracing::debug!(cycle_id = %timeline.cycle_id, reason_code, "settlement failed");

    build_receipt(
        timeline,
        FinalState::Failed,
        Some(reason_code.to_string()),
        vec![],
        signer,
        receipt_id,
    )
}

fn build_receipt(
    timeline: &SettlementTimeline,
    final_state: FinalState,
    reason_code: Option<String>,
    fees: Vec<serde_json::Value>,
    signer: &KeyRegistry,
    receipt_id: String,
) -> Result<Receipt, MarketplaceError> {
    let intent_ids: Vec<String> = timeline.legs.iter().map(|l| l.intent_id.clone()).collect();
    let asset_ids: Vec<String> = timeline
        .legs
        .iter()
        .flat_map(|l| l.assets.iter().map(|a| a.asset_key()))
        .collect();

    let signable = serde_json::json!({
        "id": receipt_id,
        "cycle_id": timeline.cycle_id,
        "final_state": final_state,
        "intent_ids": intent_ids,
        "asset_ids": asset_ids,
    });
    let signature = signer
        .sign(&signable)
        .map_err(|err| MarketplaceError::ExecutionError(err.to_string()))?;

    Ok(Receipt {
        id: receipt_id,
        cycle_id: timeline.cycle_id.clone(),
        final_state,
        intent_ids,
        asset_ids,
        fees,
        transparency: ReceiptTransparency { reason_code },
        signature,
    })
}
