//! Role gate evaluated at the top of each handler, before any file lookup.
use crate::shared::{Capability, Decision, DenyReason, Role, User};

pub struct RoleGate;

impl RoleGate {
    pub fn evaluate(role: Role, capability: Capability) -> Decision {
        if capability.requires_admin() && !role.is_admin() {
            return Decision::Deny(DenyReason::AdminRequired);
        }
        if capability.is_mutating() && role.is_read_only() {
            return Decision::Deny(DenyReason::ViewerReadOnly);
        }
        Decision::Allow
    }

    pub fn require(user: &User, capability: Capability) -> Result<(), DenyReason> {
        Self::evaluate(user.role, capability)
            .into_result()
            .inspect_err(|reason| {
                tracing::warn!(
                    "[Access] role gate denied {:?} to user {} ({}): {}",
                    capability,
                    user.id,
                    user.role,
                    reason
                );
            })
    }
}
