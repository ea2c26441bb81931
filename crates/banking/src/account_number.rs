use core::fmt;
use core::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use ledgerbank_core::DomainError;

pub const ACCOUNT_NUMBER_LEN: usize = 10;

/// Externally visible account number: exactly ten ASCII digits.
///
/// Leading zeros are significant, so this is a string and never an integer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(String);

impl AccountNumber {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let value = value.trim();
        if value.len() != ACCOUNT_NUMBER_LEN || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_argument(format!(
                "account number must be {ACCOUNT_NUMBER_LEN} digits (got '{value}')"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountNumber> for String {
    fn from(value: AccountNumber) -> Self {
        value.0
    }
}

/// Candidate generator for new account numbers.
///
/// Candidates are not guaranteed unique; the caller checks them against the
/// store and asks again on collision.
pub trait AccountNumberSource: Send + Sync {
    fn next_candidate(&self) -> AccountNumber;
}

/// Uniformly random ten-digit numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomAccountNumbers;

impl AccountNumberSource for RandomAccountNumbers {
    fn next_candidate(&self) -> AccountNumber {
        let n: u64 = rand::thread_rng().gen_range(0..10_000_000_000);
        AccountNumber(format!("{n:010}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_numbers_are_ten_digits() {
        let source = RandomAccountNumbers;
        for _ in 0..1_000 {
            let n = source.next_candidate();
            assert_eq!(n.as_str().len(), ACCOUNT_NUMBER_LEN);
            assert!(AccountNumber::parse(n.as_str()).is_ok());
        }
    }

    #[test]
    fn rejects_wrong_length_and_non_digits() {
        assert!(AccountNumber::parse("123").is_err());
        assert!(AccountNumber::parse("12345678901").is_err());
        assert!(AccountNumber::parse("12345abcde").is_err());
        assert_eq!(
            AccountNumber::parse("0000000042").unwrap().as_str(),
            "0000000042"
        );
    }

    #[test]
    fn serde_validates() {
        assert!(serde_json::from_str::<AccountNumber>("\"0123456789\"").is_ok());
        assert!(serde_json::from_str::<AccountNumber>("\"01234\"").is_err());
    }
}
