//! `ledgerbank-auth`: authentication/authorization building blocks.
//!
//! This crate is decoupled from HTTP and storage: it holds the user record and
//! its lockout rules, the role/capability policy, JWT claims, and the hasher
//! and token-issuer seams together with their production adapters.

pub mod authorize;
pub mod capability;
pub mod claims;
pub mod hasher;
pub mod lockout;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{AuthzError, Principal, authorize};
pub use capability::Capability;
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use hasher::{Argon2PasswordHasher, HashError, PasswordHasher};
pub use lockout::{LockState, LockoutPolicy};
pub use roles::{Role, RoleName};
pub use token::{IssuedToken, JwtTokenIssuer, TokenError, TokenIssuer};
pub use user::User;
