//! Helpdesk Server Library
//!
//! Core functionality for the helpdesk backend:
//! - SQLite storage for users, tickets, comments and link tokens
//! - Password hashing, session tokens and role capabilities
//! - Ticket lifecycle, chat account linking and the account directory
//! - Best-effort Telegram notifications and the bot front end

pub mod auth;
pub mod bot;
pub mod error;
pub mod notifications;
pub mod service;
pub mod storage;

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_helpers;
