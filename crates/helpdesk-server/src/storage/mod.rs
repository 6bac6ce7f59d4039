//! `SQLite` storage for the Helpdesk server.
//!
//! Provides persistence for users, link tokens, tickets and comments. Each
//! relation has its own query module; the uniqueness and state invariants
//! are enforced by the schema as well as by the callers.

mod db;
mod models;
mod queries_link_tokens;
mod queries_tickets;
mod queries_users;


pub use db::{DatabaseError, HelpdeskDatabase};
pub use models::*;
pub use queries_tickets::NewTicket;
pub use queries_users::NewUser;
