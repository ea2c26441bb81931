//! Signed bearer tokens.

use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use thiserror::Error;

use ledgerbank_core::Clock;

use crate::{JwtClaims, RoleName, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<TokenValidationError> for TokenError {
    fn from(value: TokenValidationError) -> Self {
        match value {
            TokenValidationError::Expired => TokenError::Expired,
            other => TokenError::Invalid(other.to_string()),
        }
    }
}

/// A freshly signed token and the claims inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub claims: JwtClaims,
}

pub trait TokenIssuer: Send + Sync {
    fn issue(
        &self,
        subject: &str,
        roles: &[RoleName],
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError>;

    fn validate(&self, token: &str) -> Result<JwtClaims, TokenError>;
}

impl<T> TokenIssuer for Arc<T>
where
    T: TokenIssuer + ?Sized,
{
    fn issue(
        &self,
        subject: &str,
        roles: &[RoleName],
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        (**self).issue(subject, roles, ttl)
    }

    fn validate(&self, token: &str) -> Result<JwtClaims, TokenError> {
        (**self).validate(token)
    }
}

/// HS256 JWTs; issue time and expiry are checked against the injected clock
/// rather than the library's wall-clock check.
pub struct JwtTokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl JwtTokenIssuer {
    pub fn new(secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            clock,
        }
    }
}

impl core::fmt::Debug for JwtTokenIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JwtTokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue(
        &self,
        subject: &str,
        roles: &[RoleName],
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        let now = self.clock.now();
        let claims = JwtClaims::new(subject, roles.to_vec(), now, now + ttl);
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok(IssuedToken { token, claims })
    }

    fn validate(&self, token: &str) -> Result<JwtClaims, TokenError> {
        let data = decode::<JwtClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        validate_claims(&data.claims, self.clock.now())?;
        Ok(data.claims)
    }
}
