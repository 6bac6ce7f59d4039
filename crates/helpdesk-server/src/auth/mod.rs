//! Authentication and authorization for the helpdesk.
//!
//! Provides password hashing, session tokens and the capability check.

pub mod capability;
pub mod claims;
pub mod jwt;
pub mod password;

pub use capability::{Capability, authorize};
pub use claims::Claims;
pub use jwt::{Session, SessionManager, hash_token};

use crate::storage::Role;

/// Authenticated caller as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: &str, role: Role) -> Self {
        Self {
            user_id: user_id.to_string(),
            role,
        }
    }

    pub fn authorize(&self, capability: Capability) -> crate::error::ServiceResult<()> {
        authorize(self.role, capability)
    }
}
