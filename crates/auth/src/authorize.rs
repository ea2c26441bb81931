use std::collections::BTreeSet;

use thiserror::Error;

use crate::{Capability, RoleName};

/// A fully resolved principal for authorization decisions.
///
/// Construction of this object is decoupled from storage and transport: the
/// API derives it from verified token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub roles: BTreeSet<RoleName>,
}

impl Principal {
    pub fn new(username: impl Into<String>, roles: impl IntoIterator<Item = RoleName>) -> Self {
        Self {
            username: username.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: RoleName) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: '{capability}' requires one of {required:?}")]
    Forbidden {
        capability: Capability,
        required: Vec<RoleName>,
    },
}

/// Decide whether `principal` may exercise `capability`.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, capability: Capability) -> Result<(), AuthzError> {
    let allowed = capability.allowed_roles();
    if allowed.iter().any(|role| principal.has_role(*role)) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            capability,
            required: allowed.to_vec(),
        })
    }
}
