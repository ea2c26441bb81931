use ledgerbank_auth::{Principal, RoleName};

/// Principal context for a request (authenticated username + roles), taken
/// from the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    username: String,
    roles: Vec<RoleName>,
}

impl PrincipalContext {
    pub fn new(username: String, roles: Vec<RoleName>) -> Self {
        Self { username, roles }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn roles(&self) -> &[RoleName] {
        &self.roles
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.username.clone(), self.roles.iter().copied())
    }
}
