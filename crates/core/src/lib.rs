//! `ledgerbank-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error taxonomy, money and the injectable clock.

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod versioned;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, RoleId, TransactionId, UserId};
pub use money::Amount;
pub use versioned::{ExpectedVersion, Versioned};
