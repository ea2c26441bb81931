//! API-side authorization guard.
//!
//! Handlers call this before touching any service, so services stay
//! authorization-agnostic.

use ledgerbank_auth::{AuthzError, Capability, authorize};

use crate::context::PrincipalContext;

pub fn authorize_capability(
    principal: &PrincipalContext,
    capability: Capability,
) -> Result<(), AuthzError> {
    authorize(&principal.principal(), capability)
}
