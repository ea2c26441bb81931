//! Optimistic versioning for mutable rows (accounts, users).

use crate::entity::Entity;

/// A mutable entity whose store row carries a version counter.
///
/// The store bumps the version on every successful update and refuses an
/// update whose version does not match the stored one. That refusal is what
/// turns a concurrent read-modify-write into a visible conflict instead of a
/// lost update.
pub trait Versioned: Entity {
    /// Version of the row this value was read from.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a row update.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (inserts, seeding).
    Any,
    /// Require the stored row to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn of<V: Versioned>(value: &V) -> Self {
        ExpectedVersion::Exact(value.version())
    }

    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}
