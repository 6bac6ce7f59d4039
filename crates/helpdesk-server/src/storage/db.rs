//! Database connection and initialization.

pub use helpdesk_core::db::DatabaseError;

helpdesk_core::define_database!(HelpdeskDatabase, "Helpdesk database migrations complete");
