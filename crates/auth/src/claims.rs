use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RoleName;

/// JWT claims model (transport-agnostic).
///
/// `iat`/`exp` are Unix seconds, as registered JWT claims are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the username.
    pub sub: String,

    /// Roles held at issue time.
    pub roles: Vec<RoleName>,

    pub iat: i64,
    pub exp: i64,
}

impl JwtClaims {
    pub fn new(
        subject: impl Into<String>,
        roles: Vec<RoleName>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: subject.into(),
            roles,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate JWT claims against `now`.
///
/// Note: this validates the *claims* only. Signature verification happens in
/// the token issuer before the claims are handed here.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn window_is_half_open() {
        let iat = Utc::now();
        let claims = JwtClaims::new("alice", vec![RoleName::Customer], iat, iat + Duration::minutes(60));

        assert_eq!(validate_claims(&claims, iat), Ok(()));
        assert_eq!(
            validate_claims(&claims, iat + Duration::minutes(60)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims, iat - Duration::minutes(1)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let iat = Utc::now();
        let claims = JwtClaims::new("alice", vec![], iat, iat);
        assert_eq!(
            validate_claims(&claims, iat),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
