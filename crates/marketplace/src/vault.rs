//! Vault Lifecycle (C10): holding deposit/reserve/release/withdraw for
//! the `vault` deposit mode, where an asset sits custodied ahead of any
//! particular cycle rather than being escrowed per-settlement.

use chrono::{DateTime, Utc};

use crate::entities::{AssetDescriptor, Holding, HoldingStatus};
use crate::error::MarketplaceError;
use swapgraph_core::ActorRef;

/// Deposit an asset into the vault under `owner`. Starts `available`.
pub fn deposit(holding_id: String, owner_actor: ActorRef, asset: AssetDescriptor) -> Holding {
    Holding {
        holding_id,
        owner_actor,
        asset,
        status: HoldingStatus::Available,
        reservation_id: None,
        settlement_cycle_id: None,
    }
}

/// Reserve an `available` holding against a reservation (a proposal id).
/// Idempotent for the same `reservation_id`; conflicts if another
/// reservation already holds it.
pub fn reserve(holding: &mut Holding, reservation_id: &str) -> Result<(), MarketplaceError> {
    match holding.status {
        HoldingStatus::Available => {
            holding.status = HoldingStatus::Reserved;
            holding.reservation_id = Some(reservation_id.to_string());
            Ok(())
        }
        HoldingStatus::Reserved if holding.reservation_id.as_deref() == Some(reservation_id) => {
            Ok(())
        }
        HoldingStatus::Reserved => Err(MarketplaceError::Conflict(format!(
            "holding {} already reserved by {:?}",
            holding.holding_id, holding.reservation_id
        ))),
        _ => Err(MarketplaceError::Conflict(format!(
            "holding {} is not available to reserve (status {:?})",
            holding.holding_id, holding.status
        ))),
    }
}

/// Release a reservation without entering settlement (a declined or
/// expired commit). Idempotent if already `available`.
pub fn release(holding: &mut Holding, reservation_id: &str) -> Result<(), MarketplaceError> {
    if holding.status == HoldingStatus::Available {
        return Ok(());
    }
    if holding.status != HoldingStatus::Reserved
        || holding.reservation_id.as_deref() != Some(reservation_id)
    {
        return Err(MarketplaceError::Conflict(format!(
            "holding {} is not reserved by {reservation_id}",
            holding.holding_id
        )));
    }
    holding.status = HoldingStatus::Available;
    holding.reservation_id = None;
    Ok(())
}

/// `reserved -> in_settlement`, entered once settlement begins executing.
pub fn enter_settlement(
    holding: &mut Holding,
    reservation_id: &str,
    cycle_id: String,
) -> Result<(), MarketplaceError> {
    if holding.status != HoldingStatus::Reserved
        || holding.reservation_id.as_deref() != Some(reservation_id)
    {
        return Err(MarketplaceError::Conflict(format!(
            "holding {} is not reserved by {reservation_id}",
            holding.holding_id
        )));
    }
    holding.status = HoldingStatus::InSettlement;
    holding.settlement_cycle_id = Some(cycle_id);
    Ok(())
}

/// Settlement completed: the holding changes custody and drops out of
/// this owner's vault.
pub fn complete_settlement(holding: &mut Holding) -> Result<(), MarketplaceError> {
    if holding.status != HoldingStatus::InSettlement {
        return Err(MarketplaceError::Conflict(format!(
            "holding {} is not in settlement",
            holding.holding_id
        )));
    }
    holding.status = HoldingStatus::Withdrawn;
    Ok(())
}

/// Owner-initiated withdrawal; only legal while `available`.
pub fn withdraw(holding: &mut Holding) -> Result<(), MarketplaceError> {
    if holding.status != HoldingStatus::Available {
        return Err(MarketplaceError::Conflict(format!(
            "holding {} is not available to withdraw (status {:?})",
            holding.holding_id, holding.status
        )));
    }
    holding.status = HoldingStatus::Withdrawn;
    Ok(())
}

/// Administrative freeze, e.g. a fraud signal on the owner; reversible by
/// nothing short of a manual `deposit` re-registration.
pub fn mark_not_available(holding: &mut Holding) {
    holding.status = HoldingStatus::NotAvailable;
}

pub fn is_eligible_for_offer(holding: &Holding, now: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> bool {
    if holding.status != HoldingStatus::Available {
        return false;
    }
    match expires_at {
        Some(exp) => exp > now,
        None => true,
    }
}
