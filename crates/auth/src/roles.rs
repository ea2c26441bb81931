use core::str::FromStr;

use serde::{Deserialize, Serialize};

use ledgerbank_core::{DomainError, RoleId};

/// Role identifier used for RBAC.
///
/// The set is closed: every capability check is expressed in terms of these
/// three names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleName {
    Admin,
    Staff,
    Customer,
}

impl RoleName {
    pub const ALL: [RoleName; 3] = [RoleName::Admin, RoleName::Staff, RoleName::Customer];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Admin => "ADMIN",
            RoleName::Staff => "STAFF",
            RoleName::Customer => "CUSTOMER",
        }
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().trim_start_matches("ROLE_") {
            "ADMIN" => Ok(RoleName::Admin),
            "STAFF" => Ok(RoleName::Staff),
            "CUSTOMER" => Ok(RoleName::Customer),
            other => Err(DomainError::invalid_argument(format!("unknown role '{other}'"))),
        }
    }
}

/// Seeded role reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
}

impl Role {
    pub fn new(name: RoleName) -> Self {
        Self {
            id: RoleId::new(),
            name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_or_without_prefix() {
        assert_eq!("ADMIN".parse::<RoleName>().unwrap(), RoleName::Admin);
        assert_eq!("ROLE_STAFF".parse::<RoleName>().unwrap(), RoleName::Staff);
        assert_eq!("customer".parse::<RoleName>().unwrap(), RoleName::Customer);
        assert!("auditor".parse::<RoleName>().is_err());
    }

    #[test]
    fn serializes_as_upper_snake() {
        let json = serde_json::to_string(&RoleName::Customer).unwrap();
        assert_eq!(json, "\"CUSTOMER\"");
    }
}
