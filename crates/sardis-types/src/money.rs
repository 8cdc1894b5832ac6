use crate::error::TypeError;
use serde::{Deserialize, Serialize};

/// ISO 4217 currency code, validated to three ASCII uppercase letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Result<Self, TypeError> {
        let code = code.into();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(TypeError::InvalidCurrency(code));
        }
        Ok(Self(code))
    }

    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = TypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

/// Integer minor-unit amount with its currency.
///
/// There is no floating point anywhere on the money path; arithmetic is
/// checked and currency-safe, and overflow surfaces as an error rather than
/// wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount_minor: i64,
    pub currency: CurrencyCode,
}

impl Money {
    pub fn new(amount_minor: i64, currency: CurrencyCode) -> Result<Self, TypeError> {
        if amount_minor < 0 {
            return Err(TypeError::NegativeAmount(amount_minor));
        }
        Ok(Self {
            amount_minor,
            currency,
        })
    }

    pub fn zero(currency: CurrencyCode) -> Self {
        Self {
            amount_minor: 0,
            currency,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount_minor == 0
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, TypeError> {
        self.require_same_currency(other)?;
        let amount_minor = self
            .amount_minor
            .checked_add(other.amount_minor)
            .ok_or(TypeError::AmountOverflow)?;
        Ok(Money {
            amount_minor,
            currency: self.currency.clone(),
        })
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money, TypeError> {
        self.require_same_currency(other)?;
        let amount_minor = self
            .amount_minor
            .checked_sub(other.amount_minor)
            .ok_or(TypeError::AmountOverflow)?;
        if amount_minor < 0 {
            return Err(TypeError::NegativeAmount(amount_minor));
        }
        Ok(Money {
            amount_minor,
            currency: self.currency.clone(),
        })
    }

    /// Ordering comparison, only meaningful within one currency.
    pub fn exceeds(&self, other: &Money) -> Result<bool, TypeError> {
        self.require_same_currency(other)?;
        Ok(self.amount_minor > other.amount_minor)
    }

    fn require_same_currency(&self, other: &Money) -> Result<(), TypeError> {
        if self.currency != other.currency {
            return Err(TypeError::CurrencyMismatch {
                left: self.currency.to_string(),
                right: other.currency.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount_minor, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(amount: i64) -> Money {
        Money::new(amount, CurrencyCode::usd()).unwrap()
    }

    #[test]
    fn rejects_negative_construction() {
        assert!(Money::new(-1, CurrencyCode::usd()).is_err());
    }

    #[test]
    fn rejects_lowercase_currency() {
        assert!(CurrencyCode::new("usd").is_err());
        assert!(CurrencyCode::new("USDC").is_err());
    }

    #[test]
    fn checked_add_detects_overflow() {
        let a = usd(i64::MAX);
        let b = usd(1);
        assert!(matches!(a.checked_add(&b), Err(TypeError::AmountOverflow)));
    }

    #[test]
    fn cross_currency_arithmetic_is_refused() {
        let a = usd(100);
        let b = Money::new(100, CurrencyCode::new("EUR").unwrap()).unwrap();
        assert!(matches!(
            a.checked_add(&b),
            Err(TypeError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn subtraction_cannot_go_negative() {
        let a = usd(100);
        let b = usd(150);
        assert!(a.checked_sub(&b).is_err());
    }

    #[test]
    fn exceeds_compares_within_currency() {
        assert!(usd(200).exceeds(&usd(100)).unwrap());
        assert!(!usd(100).exceeds(&usd(100)).unwrap());
    }
}
