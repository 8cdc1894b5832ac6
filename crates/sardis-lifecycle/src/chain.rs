use serde::{Deserialize, Serialize};

/// On-chain / stablecoin settlement states. A payment enters at `Submitted`
/// once the signing service has accepted the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainState {
    Submitted,
    Included,
    Confirmed,
    Failed,
    Replaced,
}

impl ChainState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChainState::Confirmed | ChainState::Failed | ChainState::Replaced
        )
    }
}

impl std::fmt::Display for ChainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainEvent {
    Included,
    Confirmed,
    Failed,
    Replaced,
}

impl ChainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChainEvent::Included => "INCLUDED",
            ChainEvent::Confirmed => "CONFIRMED",
            ChainEvent::Failed => "FAILED",
            ChainEvent::Replaced => "REPLACED",
        }
    }
}

pub fn next_state(state: ChainState, event: &ChainEvent) -> Option<ChainState> {
    use ChainEvent as E;
    use ChainState as S;

    if state.is_terminal() {
        return None;
    }

    match (state, event) {
        (S::Submitted, E::Included) => Some(S::Included),
        (S::Submitted | S::Included, E::Confirmed) => Some(S::Confirmed),
        (S::Submitted | S::Included, E::Failed) => Some(S::Failed),
        (S::Submitted | S::Included, E::Replaced) => Some(S::Replaced),
        _ => None,
    }
}
