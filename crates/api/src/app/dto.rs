use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use ledgerbank_banking::AccountType;
use ledgerbank_core::Amount;

use crate::app::errors;

pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;
pub const MIN_PASSWORD_LEN: usize = 6;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), axum::response::Response> {
        let len = self.username.trim().chars().count();
        if !USERNAME_LEN.contains(&len) {
            return Err(errors::validation("username must be 3-50 characters"));
        }
        if !self.email.contains('@') {
            return Err(errors::validation("email must be a valid address"));
        }
        validate_password(&self.password)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), axum::response::Response> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(errors::validation("username and password are required"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub destination_account_number: String,
    pub amount: Decimal,
}

impl TransferRequest {
    pub fn validate(&self) -> Result<Amount, axum::response::Response> {
        if self.destination_account_number.trim().is_empty() {
            return Err(errors::validation("destination_account_number is required"));
        }
        to_amount(self.amount)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub account_type: String,
}

impl CreateAccountRequest {
    pub fn validate(&self) -> Result<AccountType, axum::response::Response> {
        AccountType::from_str(&self.account_type)
            .map_err(|_| errors::validation("account_type must be SAVINGS or CURRENT"))
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

// -------------------------
// Validation helpers
// -------------------------

/// Positive, with at most two decimal places.
pub fn to_amount(value: Decimal) -> Result<Amount, axum::response::Response> {
    Amount::new(value).map_err(|e| errors::validation(e.to_string()))
}

pub fn validate_password(password: &str) -> Result<(), axum::response::Response> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(errors::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn parse_id<T: FromStr>(raw: &str) -> Result<T, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::validation(format!("'{raw}' is not a valid id")))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use ledgerbank_core::AccountId;

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn amounts_must_be_positive_with_two_decimals() {
        assert_eq!(to_amount(dec("10.50")).unwrap().value(), dec("10.50"));
        assert!(to_amount(dec("10.500")).is_ok());
        assert_eq!(
            to_amount(dec("10.001")).unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
        assert!(to_amount(dec("0")).is_err());
        assert!(to_amount(dec("-5")).is_err());
    }

    #[test]
    fn register_request_rules() {
        let ok = RegisterRequest {
            username: "carol".into(),
            email: "carol@example.com".into(),
            password: "secret1".into(),
        };
        assert!(ok.validate().is_ok());

        let short_name = RegisterRequest {
            username: "ab".into(),
            ..ok.clone()
        };
        assert!(short_name.validate().is_err());

        let bad_email = RegisterRequest {
            email: "carol.example.com".into(),
            ..ok.clone()
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            password: "12345".into(),
            ..ok.clone()
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn transfer_needs_destination() {
        let req = TransferRequest {
            destination_account_number: "  ".into(),
            amount: dec("1"),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn ids_must_be_uuids() {
        assert!(parse_id::<AccountId>("not-a-uuid").is_err());
        assert!(parse_id::<AccountId>(&AccountId::new().to_string()).is_ok());
    }
}
