use thiserror::Error;

use ledgerbank_auth::{HashError, TokenError};
use ledgerbank_core::DomainError;

use crate::store::StoreError;

/// Error returned by the application services.
///
/// `Domain` is a business outcome the caller can act on; everything else is
/// an infrastructure fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hashing(#[from] HashError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("no unused account number found after {attempts} attempts")]
    AccountNumberExhausted { attempts: u32 },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ServiceError {
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
