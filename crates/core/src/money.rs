//! Exact fixed-point money.
//!
//! Balances are plain `Decimal`s (they may be zero). Amounts moved by an
//! operation are `Amount`s: strictly positive, at most two fractional digits.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Number of fractional digits the ledger keeps (cents).
pub const MONEY_SCALE: u32 = 2;

/// Largest value a balance or amount may hold: `NUMERIC(19, 2)`, i.e.
/// 99,999,999,999,999,999.99.
pub fn max_money() -> Decimal {
    Decimal::from_i128_with_scale(9_999_999_999_999_999_999, MONEY_SCALE)
}

/// A strictly positive monetary amount.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value <= Decimal::ZERO {
            return Err(DomainError::invalid_argument(format!(
                "amount must be greater than 0 (got {value})"
            )));
        }
        if value.normalize().scale() > MONEY_SCALE {
            return Err(DomainError::invalid_argument(format!(
                "amount must have at most {MONEY_SCALE} decimal places (got {value})"
            )));
        }
        if value > max_money() {
            return Err(DomainError::invalid_argument(format!(
                "amount must not exceed {} (got {value})",
                max_money()
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// `balance + self`, refused when the result would not fit a balance.
    pub fn added_to(&self, balance: Decimal) -> DomainResult<Decimal> {
        balance
            .checked_add(self.0)
            .filter(|total| *total <= max_money())
            .ok_or_else(|| {
                DomainError::invalid_argument(format!(
                    "adding {self} to {balance} exceeds the maximum balance {}",
                    max_money()
                ))
            })
    }

    /// `balance - self`, refused when the result would be negative.
    pub fn taken_from(&self, balance: Decimal) -> DomainResult<Decimal> {
        balance
            .checked_sub(self.0)
            .filter(|rest| *rest >= Decimal::ZERO)
            .ok_or_else(|| {
                DomainError::insufficient_funds(format!("{balance} available, {self} requested"))
            })
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Amount::new(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_and_negative_are_rejected() {
        assert!(matches!(
            Amount::new(Decimal::ZERO),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            Amount::new(Decimal::new(-1, 0)),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn sub_cent_precision_is_rejected() {
        assert!(Amount::new(Decimal::new(1, 3)).is_err());
        // Trailing zeros do not count as precision.
        assert!(Amount::new(Decimal::new(1500, 3)).is_ok());
    }

    #[test]
    fn deserializes_from_string_and_number() {
        let a: Amount = serde_json::from_str("\"12.50\"").unwrap();
        assert_eq!(a.value(), Decimal::new(1250, 2));
        let b: Amount = serde_json::from_str("7").unwrap();
        assert_eq!(b.value(), Decimal::from(7));
        assert!(serde_json::from_str::<Amount>("\"-3\"").is_err());
    }

    #[test]
    fn amounts_are_capped_at_the_column_maximum() {
        assert_eq!(Amount::new(max_money()).unwrap().value(), max_money());
        assert!(matches!(
            Amount::new(Decimal::from_i128_with_scale(100_000_000_000_000_000, 0)),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            Amount::new(Decimal::MAX),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(serde_json::from_str::<Amount>("\"100000000000000000\"").is_err());
    }

    #[test]
    fn balance_arithmetic_is_checked() {
        let one = Amount::new(Decimal::ONE).unwrap();
        assert_eq!(one.added_to(Decimal::new(150, 2)).unwrap(), Decimal::new(250, 2));
        assert!(matches!(
            one.added_to(max_money()),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            one.added_to(Decimal::MAX),
            Err(DomainError::InvalidArgument(_))
        ));

        assert_eq!(one.taken_from(Decimal::ONE).unwrap(), Decimal::ZERO);
        assert!(matches!(
            one.taken_from(Decimal::new(99, 2)),
            Err(DomainError::InsufficientFunds(_))
        ));
        assert!(matches!(
            one.taken_from(Decimal::MIN),
            Err(DomainError::InsufficientFunds(_))
        ));
    }

    proptest! {
        #[test]
        fn every_positive_cent_value_is_accepted(cents in 1i64..10_000_000_000i64) {
            let amount = Amount::new(Decimal::new(cents, 2)).unwrap();
            prop_assert!(amount.value() > Decimal::ZERO);
        }
    }
}
