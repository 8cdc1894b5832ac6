use serde::{Deserialize, Serialize};

/// ACH payment states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AchState {
    Pending,
    Reviewed,
    Processed,
    Settled,
    Released,
    ReturnInitiated,
    Returned,
    Declined,
    Voided,
    Reversed,
    Expired,
}

impl AchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AchState::Declined
                | AchState::Voided
                | AchState::Reversed
                | AchState::Expired
                | AchState::Released
                | AchState::Returned
        )
    }
}

impl std::fmt::Display for AchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Normalized ACH provider events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AchEvent {
    OriginationInitiated,
    Reviewed,
    Processed,
    Settled,
    Released,
    ReturnInitiated { return_code: ReturnCode },
    Returned,
    Declined,
    Voided,
    Reversed,
    Expired,
}

impl AchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AchEvent::OriginationInitiated => "ORIGINATION_INITIATED",
            AchEvent::Reviewed => "REVIEWED",
            AchEvent::Processed => "PROCESSED",
            AchEvent::Settled => "SETTLED",
            AchEvent::Released => "RELEASED",
            AchEvent::ReturnInitiated { .. } => "ACH_RETURN_INITIATED",
            AchEvent::Returned => "RETURNED",
            AchEvent::Declined => "DECLINED",
            AchEvent::Voided => "VOIDED",
            AchEvent::Reversed => "REVERSED",
            AchEvent::Expired => "EXPIRED",
        }
    }
}

/// NACHA return codes the control plane branches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnCode {
    R01,
    R02,
    R03,
    R09,
    R29,
    #[serde(untagged)]
    Other(String),
}

impl ReturnCode {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "R01" => ReturnCode::R01,
            "R02" => ReturnCode::R02,
            "R03" => ReturnCode::R03,
            "R09" => ReturnCode::R09,
            "R29" => ReturnCode::R29,
            other => ReturnCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReturnCode::R01 => "R01",
            ReturnCode::R02 => "R02",
            ReturnCode::R03 => "R03",
            ReturnCode::R09 => "R09",
            ReturnCode::R29 => "R29",
            ReturnCode::Other(code) => code,
        }
    }

    /// Authoritative handling matrix: insufficient-funds style codes retry
    /// with the account left active; account-defect codes pause the external
    /// account and never auto-retry, with R29 escalating to manual review.
    pub fn disposition(&self) -> ReturnDisposition {
        match self {
            ReturnCode::R01 | ReturnCode::R09 => ReturnDisposition {
                auto_retry_eligible: true,
                pause_external_account: false,
                manual_review: false,
            },
            ReturnCode::R02 | ReturnCode::R03 => ReturnDisposition {
                auto_retry_eligible: false,
                pause_external_account: true,
                manual_review: false,
            },
            ReturnCode::R29 => ReturnDisposition {
                auto_retry_eligible: false,
                pause_external_account: true,
                manual_review: true,
            },
            ReturnCode::Other(_) => ReturnDisposition {
                auto_retry_eligible: false,
                pause_external_account: false,
                manual_review: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnDisposition {
    pub auto_retry_eligible: bool,
    pub pause_external_account: bool,
    pub manual_review: bool,
}

/// Allowed ACH transitions. `None` means the event is invalid in this state.
pub fn next_state(state: AchState, event: &AchEvent) -> Option<AchState> {
    use AchEvent as E;
    use AchState as S;

    // Terminal states never move; idempotent re-assertion is handled above
    // this table by the machine.
    if state.is_terminal() {
        return None;
    }

    match (state, event) {
        // Origination confirmation does not advance the state.
        (S::Pending, E::OriginationInitiated) => Some(S::Pending),
        (S::Pending, E::Reviewed) => Some(S::Reviewed),
        (S::Reviewed, E::Processed) => Some(S::Processed),
        (S::Processed, E::Settled) => Some(S::Settled),
        (S::Settled, E::Released) => Some(S::Released),
        (S::Processed | S::Settled, E::ReturnInitiated { .. }) => Some(S::ReturnInitiated),
        (S::ReturnInitiated, E::Returned) => Some(S::Returned),
        // Any non-terminal state can be declined by a declined result.
        (_, E::Declined) => Some(S::Declined),
        (S::Pending | S::Reviewed | S::Processed, E::Voided) => Some(S::Voided),
        (S::Settled, E::Reversed) => Some(S::Reversed),
        (_, E::Expired) => Some(S::Expired),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_released() {
        let mut state = AchState::Pending;
        for event in [
            AchEvent::OriginationInitiated,
            AchEvent::Reviewed,
            AchEvent::Processed,
            AchEvent::Settled,
            AchEvent::Released,
        ] {
            state = next_state(state, &event).expect("transition allowed");
        }
        assert_eq!(state, AchState::Released);
        assert!(state.is_terminal());
    }

    #[test]
    fn return_branch_from_settled() {
        let state = next_state(
            AchState::Settled,
            &AchEvent::ReturnInitiated {
                return_code: ReturnCode::R03,
            },
        )
        .unwrap();
        assert_eq!(state, AchState::ReturnInitiated);
        let state = next_state(state, &AchEvent::Returned).unwrap();
        assert_eq!(state, AchState::Returned);
    }

    #[test]
    fn terminal_states_never_move() {
        for terminal in [
            AchState::Released,
            AchState::Returned,
            AchState::Declined,
            AchState::Voided,
            AchState::Reversed,
            AchState::Expired,
        ] {
            assert!(next_state(terminal, &AchEvent::Settled).is_none());
            assert!(next_state(terminal, &AchEvent::Declined).is_none());
        }
    }

    #[test]
    fn skipping_stages_is_rejected() {
        assert!(next_state(AchState::Pending, &AchEvent::Settled).is_none());
        assert!(next_state(AchState::Reviewed, &AchEvent::Released).is_none());
    }

    #[test]
    fn return_code_matrix() {
        assert!(ReturnCode::R01.disposition().auto_retry_eligible);
        assert!(ReturnCode::R09.disposition().auto_retry_eligible);
        for code in [ReturnCode::R02, ReturnCode::R03, ReturnCode::R29] {
            let disposition = code.disposition();
            assert!(!disposition.auto_retry_eligible);
            assert!(disposition.pause_external_account);
        }
        assert!(ReturnCode::R29.disposition().manual_review);
        assert!(!ReturnCode::R03.disposition().manual_review);
    }

    #[test]
    fn unknown_return_codes_go_to_manual_review() {
        let disposition = ReturnCode::parse("R16").disposition();
        assert!(!disposition.auto_retry_eligible);
        assert!(disposition.manual_review);
    }
}
