use serde::{Deserialize, Serialize};

/// Card-rail states. A payment enters at `Authorized` once the issuer
/// accepts the authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardState {
    Authorized,
    Captured,
    Reversed,
    Declined,
    Expired,
}

impl CardState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CardState::Reversed | CardState::Declined | CardState::Expired
        )
    }
}

impl std::fmt::Display for CardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardEvent {
    Captured,
    Reversed,
    Declined,
    Expired,
}

impl CardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CardEvent::Captured => "CAPTURED",
            CardEvent::Reversed => "REVERSED",
            CardEvent::Declined => "DECLINED",
            CardEvent::Expired => "EXPIRED",
        }
    }
}

pub fn next_state(state: CardState, event: &CardEvent) -> Option<CardState> {
    use CardEvent as E;
    use CardState as S;

    if state.is_terminal() {
        return None;
    }

    match (state, event) {
        (S::Authorized, E::Captured) => Some(S::Captured),
        (S::Authorized, E::Declined) => Some(S::Declined),
        (S::Authorized, E::Expired) => Some(S::Expired),
        (S::Captured, E::Reversed) => Some(S::Reversed),
        _ => None,
    }
}
