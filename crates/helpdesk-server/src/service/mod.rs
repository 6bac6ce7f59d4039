//! Helpdesk operations.
//!
//! [`TicketLifecycle`], [`IdentityLinker`] and [`AccountDirectory`] hold the
//! rules; [`Helpdesk`] wires them together and checks caller identity.

pub mod account_svc;
pub mod helpdesk;
pub mod link_svc;
pub mod ticket_svc;

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod helpdesk_tests;
#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod link_svc_tests;

pub use account_svc::{AccountDirectory, ChannelProfile};
pub use helpdesk::{ChannelLogin, Helpdesk};
pub use link_svc::{IdentityLinker, IssuedLinkToken, LinkMode, Redemption};
pub use ticket_svc::{TicketDetail, TicketLifecycle};
