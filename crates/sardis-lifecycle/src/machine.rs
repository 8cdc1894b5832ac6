use crate::ach::{self, AchEvent, AchState};
use crate::card::{self, CardEvent, CardState};
use crate::chain::{self, ChainEvent, ChainState};
use crate::error::LifecycleError;
use crate::payment::PaymentRecord;
use crate::MAX_ACH_RETRIES;
use sardis_types::Rail;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Current state of a payment on its rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rail", content = "state", rename_all = "snake_case")]
pub enum RailState {
    Ach(AchState),
    Card(CardState),
    Chain(ChainState),
}

impl RailState {
    pub fn initial(rail: Rail) -> Self {
        match rail {
            Rail::Ach => RailState::Ach(AchState::Pending),
            Rail::Card => RailState::Card(CardState::Authorized),
            Rail::OnChain | Rail::Stablecoin => RailState::Chain(ChainState::Submitted),
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            RailState::Ach(state) => state.is_terminal(),
            RailState::Card(state) => state.is_terminal(),
            RailState::Chain(state) => state.is_terminal(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            RailState::Ach(state) => state.to_string(),
            RailState::Card(state) => state.to_string(),
            RailState::Chain(state) => state.to_string(),
        }
    }
}

/// Normalized provider event, tagged by rail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rail", content = "payload", rename_all = "snake_case")]
pub enum RailEvent {
    Ach(AchEvent),
    Card(CardEvent),
    Chain(ChainEvent),
}

impl RailEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RailEvent::Ach(event) => event.name(),
            RailEvent::Card(event) => event.name(),
            RailEvent::Chain(event) => event.name(),
        }
    }

    /// The terminal state this event would re-assert, if any. Used to accept
    /// duplicate deliveries of a terminal event as no-ops.
    fn asserts_terminal(&self) -> Option<RailState> {
        match self {
            RailEvent::Ach(AchEvent::Released) => Some(RailState::Ach(AchState::Released)),
            RailEvent::Ach(AchEvent::Returned) => Some(RailState::Ach(AchState::Returned)),
            RailEvent::Ach(AchEvent::Declined) => Some(RailState::Ach(AchState::Declined)),
            RailEvent::Ach(AchEvent::Voided) => Some(RailState::Ach(AchState::Voided)),
            RailEvent::Ach(AchEvent::Reversed) => Some(RailState::Ach(AchState::Reversed)),
            RailEvent::Ach(AchEvent::Expired) => Some(RailState::Ach(AchState::Expired)),
            RailEvent::Card(CardEvent::Reversed) => Some(RailState::Card(CardState::Reversed)),
            RailEvent::Card(CardEvent::Declined) => Some(RailState::Card(CardState::Declined)),
            RailEvent::Card(CardEvent::Expired) => Some(RailState::Card(CardState::Expired)),
            RailEvent::Chain(ChainEvent::Confirmed) => {
                Some(RailState::Chain(ChainState::Confirmed))
            }
            RailEvent::Chain(ChainEvent::Failed) => Some(RailState::Chain(ChainState::Failed)),
            RailEvent::Chain(ChainEvent::Replaced) => Some(RailState::Chain(ChainState::Replaced)),
            _ => None,
        }
    }
}

/// What applying one event did to the payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub status: RailState,
    /// False when the event was an accepted no-op (duplicate terminal).
    pub changed: bool,
    pub pause_external_account: bool,
    /// A retry slot was consumed and a retry should be scheduled.
    pub retry_scheduled: bool,
    pub manual_review: bool,
}

/// Apply one normalized provider event to a payment record.
///
/// Transitions are idempotent with respect to redelivery: re-asserting the
/// current terminal state is accepted without change. Anything else outside
/// the rail's table is an `InvalidTransition` and leaves the record
/// untouched; callers log it as `policy.invalid_transition`.
pub fn apply_event(
    payment: &mut PaymentRecord,
    event: &RailEvent,
) -> Result<TransitionOutcome, LifecycleError> {
    let next = match (&payment.status, event) {
        (RailState::Ach(state), RailEvent::Ach(ach_event)) => {
            ach::next_state(*state, ach_event).map(RailState::Ach)
        }
        (RailState::Card(state), RailEvent::Card(card_event)) => {
            card::next_state(*state, card_event).map(RailState::Card)
        }
        (RailState::Chain(state), RailEvent::Chain(chain_event)) => {
            chain::next_state(*state, chain_event).map(RailState::Chain)
        }
        _ => return Err(LifecycleError::RailMismatch),
    };

    let Some(next) = next else {
        // Redelivery of the terminal state the payment is already in is not
        // an error; it must acknowledge without changing anything.
        if payment.status.is_terminal() && event.asserts_terminal() == Some(payment.status) {
            return Ok(TransitionOutcome {
                status: payment.status,
                changed: false,
                pause_external_account: false,
                retry_scheduled: false,
                manual_review: false,
            });
        }
        warn!(
            payment = %payment.payment_id,
            from = %payment.status.label(),
            event = event.name(),
            "policy.invalid_transition"
        );
        return Err(LifecycleError::InvalidTransition {
            from: payment.status.label(),
            event: event.name().to_string(),
        });
    };

    let mut outcome = TransitionOutcome {
        status: next,
        changed: next != payment.status,
        pause_external_account: false,
        retry_scheduled: false,
        manual_review: false,
    };

    // Rail-specific side conditions.
    match event {
        RailEvent::Ach(AchEvent::Settled) => {
            payment.settle_pending()?;
        }
        RailEvent::Ach(AchEvent::ReturnInitiated { return_code }) => {
            let disposition = return_code.disposition();
            payment.last_return_reason = Some(return_code.as_str().to_string());
            outcome.pause_external_account = disposition.pause_external_account;
            outcome.manual_review = disposition.manual_review;
            if disposition.auto_retry_eligible && payment.retry_count < MAX_ACH_RETRIES {
                payment.retry_count += 1;
                outcome.retry_scheduled = true;
            }
        }
        RailEvent::Card(CardEvent::Captured) => {
            payment.settle_pending()?;
        }
        RailEvent::Chain(ChainEvent::Confirmed) => {
            payment.settle_pending()?;
        }
        _ => {}
    }

    payment.status = next;
    if next.is_terminal() {
        payment.zero_pending();
    }
    Ok(outcome)
}
