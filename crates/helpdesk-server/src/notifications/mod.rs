//! Best-effort chat notifications.
//!
//! This module provides:
//! - [`MessageSender`], the send-message capability of the chat transport
//! - [`TelegramClient`], its Telegram Bot API implementation
//! - [`NotificationRelay`], a bounded fire-and-forget dispatcher whose
//!   failures are only ever logged
//! - [`templates`], the user-facing message texts

pub mod relay;
pub mod telegram;
pub mod templates;

use async_trait::async_trait;
use tracing::info;

pub use relay::{NotificationDispatcher, NotificationRelay};
pub use telegram::TelegramClient;

/// Errors that can occur while talking to the chat transport.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// The client could not be built from its configuration.
    #[error("Telegram configuration error: {0}")]
    Config(String),

    /// HTTP request to the Bot API failed.
    #[error("Telegram request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The Bot API answered with a failure.
    #[error("Telegram API error (status {status}): {description}")]
    Api {
        /// HTTP status code returned by the API.
        status: u16,
        /// Error description from the response body.
        description: String,
    },
}

/// Delivers a text message to a chat. No delivery guarantee.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotificationError>;
}

/// Sender used when no bot token is configured: messages only reach the log.
#[derive(Debug, Default)]
pub struct LogSender;

#[async_trait]
impl MessageSender for LogSender {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotificationError> {
        info!(chat_id, chars = text.chars().count(), "Telegram disabled, notification logged only");
        Ok(())
    }
}
