//! Intent Service (C6): create/update/cancel/list of swap intents.

use chrono::{DateTime, Utc};
use swapgraph_core::ActorRef;

use crate::entities::{
    IntentStatus, SettlementPreferences, SwapIntent, TimeConstraints, TrustConstraints, ValueBand,
    WantSpec,
};
use crate::error::MarketplaceError;
use crate::reservations::ReservationBook;

pub struct CreateIntentParams {
    pub id: String,
    pub partner_id: Option<String>,
    pub actor: ActorRef,
    pub offer: Vec<crate::entities::AssetDescriptor>,
    pub want_spec: WantSpec,
    pub value_band: ValueBand,
    pub trust_constraints: TrustConstraints,
    pub time_constraints: TimeConstraints,
    pub settlement_preferences: SettlementPreferences,
}

fn validate_want_spec(want_spec: &WantSpec) -> Result<(), MarketplaceError> {
    let empty = match want_spec {
        WantSpec::Any { asset_keys } => asset_keys.is_empty(),
        WantSpec::Category { categories } => categories.is_empty(),
    };
    if empty {
        return Err(MarketplaceError::Validation(
            "want_spec must name at least one alternative".to_string(),
        ));
    }
    Ok(())
}

pub fn create_intent(params: CreateIntentParams, now: DateTime<Utc>) -> Result<SwapIntent, MarketplaceError> {
    if params.offer.is_empty() {
        return Err(MarketplaceError::Validation(
            "offer must not be empty".to_string(),
        ));
    }
    validate_want_spec(&params.want_spec)?;
    if !params.value_band.is_monotone() {
        return Err(MarketplaceError::Validation(
            "value_band.min_usd must not exceed max_usd".to_string(),
        ));
    }
    if params.time_constraints.expires_at <= now {
        return Err(MarketplaceError::Validation(
            "time_constraints.expires_at is already in the past".to_string(),
        ));
    }

    Ok(SwapIntent {
        id: params.id,
        partner_id: params.partner_id,
        actor: params.actor,
        offer: params.offer,
        want_spec: params.want_spec,
        value_band: params.value_band,
        trust_constraints: params.trust_constraints,
        time_constraints: params.time_constraints,
        settlement_preferences: params.settlement_preferences,
        status: IntentStatus::Active,
        created_at: now,
        updated_at: now,
    })
}

pub struct UpdateIntentParams {
    pub value_band: Option<ValueBand>,
    pub time_constraints: Option<TimeConstraints>,
    pub trust_constraints: Option<TrustConstraints>,
}

pub fn update_intent(
    intent: &mut SwapIntent,
    params: UpdateIntentParams,
    now: DateTime<Utc>,
) -> Result<(), MarketplaceError> {
    if intent.status != IntentStatus::Active {
        return Err(MarketplaceError::Validation(
            "only active intents may be updated".to_string(),
        ));
    }
    if let Some(value_band) = params.value_band {
        if !value_band.is_monotone() {
            return Err(MarketplaceError::Validation(
                "value_band.min_usd must not exceed max_usd".to_string(),
            ));
        }
        intent.value_band = value_band;
    }
    if let Some(time_constraints) = params.time_constraints {
        if time_constraints.expires_at <= now {
            return Err(MarketplaceError::Validation(
                "time_constraints.expires_at is already in the past".to_string(),
            ));
        }
        intent.time_constraints = time_constraints;
    }
    if let Some(trust_constraints) = params.trust_constraints {
        intent.trust_constraints = trust_constraints;
    }
    intent.updated_at = now;
    Ok(())
}

/// Cancel is forbidden while the intent is reserved for a non-terminal
/// proposal.
pub fn cancel_intent(
    intent: &mut SwapIntent,
    reservations: &ReservationBook,
    now: DateTime<Utc>,
) -> Result<(), MarketplaceError> {
    if reservations.is_reserved(&intent.id) {
        return Err(MarketplaceError::IntentReserved);
    }
    intent.status = IntentStatus::Cancelled;
    intent.updated_at = now;
    Ok(())
}
