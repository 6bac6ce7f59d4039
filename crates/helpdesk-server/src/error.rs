//! Error taxonomy surfaced to callers of helpdesk operations.
//!
//! Storage failures never leak: they are logged and collapsed into
//! [`ServiceError::Internal`], except for unique-key violations and missing
//! rows which have a caller-facing meaning.

use tracing::{debug, error};

use crate::storage::DatabaseError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Coarse error classification, stable for transports to map onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Conflict,
    InvalidToken,
    Unauthorized,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed input (field length or shape).
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Role insufficient for the requested operation.
    #[error("{0}")]
    Forbidden(String),

    /// Duplicate unique key.
    #[error("{0}")]
    Conflict(String),

    /// The chat account is already bound to a different user.
    #[error("This chat account is already linked to another user")]
    ChannelAlreadyLinked,

    /// Link token absent, used or expired.
    #[error("Invalid or expired link token")]
    InvalidToken,

    /// No identity on a protected operation.
    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal error")]
    Internal,
}

impl ServiceError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) | Self::ChannelAlreadyLinked => ErrorKind::Conflict,
            Self::InvalidToken => ErrorKind::InvalidToken,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Internal => ErrorKind::Internal,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unauthenticated() -> Self {
        Self::Unauthorized("Authentication required".into())
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => Self::NotFound(what),
            DatabaseError::Conflict(detail) => {
                debug!(%detail, "Unique constraint violated");
                Self::Conflict("Resource already exists".into())
            }
            other => {
                error!(error = %other, "Storage failure");
                Self::Internal
            }
        }
    }
}
