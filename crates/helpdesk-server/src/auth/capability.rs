//! Role-based capability checks.
//!
//! Every privileged operation asks [`authorize`] instead of inspecting the
//! role itself.

use crate::error::{ServiceError, ServiceResult};
use crate::storage::Role;

/// Privileged actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Move a ticket to another status (claims or releases it).
    ChangeTicketStatus,
    ViewAllTickets,
    /// Read a ticket owned by someone else.
    ViewAnyTicket,
    ListUsers,
    ManageRoles,
}

impl Capability {
    /// Whether `role` holds this capability.
    pub const fn granted_to(self, role: Role) -> bool {
        match self {
            Self::ChangeTicketStatus | Self::ViewAllTickets | Self::ViewAnyTicket | Self::ListUsers => {
                role.is_staff()
            }
            Self::ManageRoles => matches!(role, Role::Admin),
        }
    }

    const fn denial(self) -> &'static str {
        match self {
            Self::ChangeTicketStatus => "Only staff can change ticket status",
            Self::ViewAllTickets => "Only staff can list all tickets",
            Self::ViewAnyTicket => "You can only view your own tickets",
            Self::ListUsers => "Only staff can list users",
            Self::ManageRoles => "Only administrators can change roles",
        }
    }
}

/// Fail with `Forbidden` unless `role` holds `capability`.
pub fn authorize(role: Role, capability: Capability) -> ServiceResult<()> {
    if capability.granted_to(role) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(capability.denial().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_capabilities() {
        for cap in [
            Capability::ChangeTicketStatus,
            Capability::ViewAllTickets,
            Capability::ViewAnyTicket,
            Capability::ListUsers,
        ] {
            assert!(authorize(Role::Admin, cap).is_ok());
            assert!(authorize(Role::Support, cap).is_ok());
            assert!(matches!(
                authorize(Role::User, cap),
                Err(ServiceError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn only_admin_manages_roles() {
        assert!(authorize(Role::Admin, Capability::ManageRoles).is_ok());
        assert!(authorize(Role::Support, Capability::ManageRoles).is_err());
        assert!(authorize(Role::User, Capability::ManageRoles).is_err());
    }
}
