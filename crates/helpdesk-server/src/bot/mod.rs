//! Telegram bot front end.
//!
//! Long-polls `getUpdates` and answers each message with the reply computed
//! by [`commands::respond`]. Polling errors are logged and retried after a
//! short pause; the loop ends when the cancellation token fires.

pub mod commands;

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::notifications::TelegramClient;
use crate::notifications::telegram::{IncomingMessage, Update};
use crate::service::Helpdesk;

pub use commands::{BotCommand, respond};

/// Pause after a failed `getUpdates` call.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Offset that acknowledges every update in `updates`.
pub fn next_offset(current: i64, updates: &[Update]) -> i64 {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .fold(current, i64::max)
}

pub struct TelegramBot {
    client: TelegramClient,
    helpdesk: Helpdesk,
    poll_timeout_secs: u64,
}

impl TelegramBot {
    pub const fn new(client: TelegramClient, helpdesk: Helpdesk, poll_timeout_secs: u64) -> Self {
        Self {
            client,
            helpdesk,
            poll_timeout_secs,
        }
    }

    /// Poll until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        info!(poll_timeout_secs = self.poll_timeout_secs, "Telegram bot started");
        let mut offset = 0;

        loop {
            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                polled = self.client.get_updates(offset, self.poll_timeout_secs) => polled,
            };

            match polled {
                Ok(updates) => {
                    offset = next_offset(offset, &updates);
                    for update in updates {
                        if let Some(message) = update.message {
                            self.handle(&message).await;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Polling Telegram updates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("Telegram bot stopped");
    }

    async fn handle(&self, message: &IncomingMessage) {
        let Some(reply) = respond(&self.helpdesk, message).await else {
            return;
        };
        let chat_id = message.chat.id.to_string();
        match self.client.send_message(&chat_id, &reply).await {
            Ok(()) => debug!(chat_id, "Bot reply sent"),
            Err(e) => warn!(chat_id, error = %e, "Bot reply failed"),
        }
    }
}
