//! Shared primitives for the Sardis control plane.
//!
//! Everything on the money path speaks in these types: integer minor-unit
//! amounts, prefix-namespaced identifiers, content-addressed mandates, and a
//! closed reason-code enumeration. Strings are presentation only.

#![deny(unsafe_code)]

pub mod error;
pub mod hash;
pub mod ids;
pub mod mandate;
pub mod money;
pub mod reason;

pub use error::TypeError;
pub use hash::{canonical_digest, rfc3339_ms};
pub use ids::{
    AgentId, ApprovalId, CardId, DecisionId, ExternalBankAccountId, FinancialAccountId, HoldId,
    LedgerEntryId, MandateId, OrgId, PaymentId, ProviderEventId, WalletId,
};
pub use mandate::{Mandate, MandateDraft};
pub use money::{CurrencyCode, Money};
pub use reason::ReasonCode;

use serde::{Deserialize, Serialize};

/// Channel over which value moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rail {
    Ach,
    Card,
    OnChain,
    Stablecoin,
}

impl Rail {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rail::Ach => "ach",
            Rail::Card => "card",
            Rail::OnChain => "on_chain",
            Rail::Stablecoin => "stablecoin",
        }
    }

    pub const ALL: [Rail; 4] = [Rail::Ach, Rail::Card, Rail::OnChain, Rail::Stablecoin];
}

impl std::fmt::Display for Rail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Rail {
    type Err = TypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ach" => Ok(Rail::Ach),
            "card" => Ok(Rail::Card),
            "on_chain" => Ok(Rail::OnChain),
            "stablecoin" => Ok(Rail::Stablecoin),
            other => Err(TypeError::UnknownRail(other.to_string())),
        }
    }
}

/// Direction of value movement relative to the subject wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Debit,
    Credit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Debit => "debit",
            Direction::Credit => "credit",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
