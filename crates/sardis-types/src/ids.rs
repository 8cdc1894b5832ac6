use crate::error::TypeError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Mint a fresh identifier with the namespace prefix.
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::new_v4().simple()))
            }

            /// Accept an externally supplied identifier, enforcing the prefix.
            pub fn parse(value: impl Into<String>) -> Result<Self, TypeError> {
                let value = value.into();
                let Some(rest) = value.strip_prefix(concat!($prefix, "_")) else {
                    return Err(TypeError::InvalidIdPrefix {
                        prefix: $prefix,
                        value,
                    });
                };
                if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                    return Err(TypeError::MalformedId(value));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Tenant organization.
    OrgId,
    "org"
);
typed_id!(
    /// Autonomous agent acting on behalf of an org.
    AgentId,
    "agt"
);
typed_id!(
    /// Wallet holding spendable balance.
    WalletId,
    "wlt"
);
typed_id!(
    /// Payment lifecycle entity.
    PaymentId,
    "pay"
);
typed_id!(
    /// Immutable authorization record produced by an agent.
    MandateId,
    "mnd"
);
typed_id!(
    /// Two-phase reservation against a wallet.
    HoldId,
    "hld"
);
typed_id!(
    /// Issued card reference. The core never holds PAN or CVV.
    CardId,
    "crd"
);
typed_id!(
    /// Counterparty bank account reference.
    ExternalBankAccountId,
    "eba"
);
typed_id!(
    /// Treasury financial account at a provider.
    FinancialAccountId,
    "fin"
);
typed_id!(
    /// Provider-assigned event identifier, half of the webhook dedupe key.
    ProviderEventId,
    "evt"
);
typed_id!(
    /// Append-only audit ledger entry.
    LedgerEntryId,
    "ltx"
);
typed_id!(
    /// Policy decision, for correlation between response, ledger, and logs.
    DecisionId,
    "dcn"
);
typed_id!(
    /// Approval request handled by the approval manager.
    ApprovalId,
    "apr"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_prefix() {
        let id = PaymentId::generate();
        assert!(id.as_str().starts_with("pay_"));
    }

    #[test]
    fn parse_rejects_foreign_prefix() {
        let err = PaymentId::parse("ltx_0af3").unwrap_err();
        assert!(matches!(err, TypeError::InvalidIdPrefix { prefix: "pay", .. }));
    }

    #[test]
    fn parse_rejects_empty_body() {
        assert!(PaymentId::parse("pay_").is_err());
    }

    #[test]
    fn parse_roundtrips_generated() {
        let id = LedgerEntryId::generate();
        let parsed = LedgerEntryId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_is_transparent() {
        let id = OrgId::parse("org_acme1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"org_acme1\"");
    }
}
