//! Telegram Bot API client.
//!
//! Covers the two calls the helpdesk needs: `sendMessage` for notifications
//! and bot replies, and `getUpdates` for the long-polling bot loop.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MessageSender, NotificationError};

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Incoming update from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Telegram account of a message author.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Client for the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    /// `{api_url}/bot{token}`; contains the secret token, never logged.
    bot_url: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Create a client for the bot identified by `bot_token`.
    pub fn new(api_url: &str, bot_token: &str) -> Result<Self, NotificationError> {
        if bot_token.is_empty() {
            return Err(NotificationError::Config("bot token is empty".into()));
        }
        if api_url.is_empty() {
            return Err(NotificationError::Config("api url is empty".into()));
        }

        // reqwest is built with rustls-no-provider; the Err case only means a
        // provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            bot_url: format!("{}/bot{}", api_url.trim_end_matches('/'), bot_token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.bot_url)
    }

    /// Turn a Bot API response into its result or an [`NotificationError::Api`].
    async fn read_response<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<Option<T>, NotificationError> {
        let status = resp.status();
        let body: ApiResponse<T> = resp.json().await?;
        if !status.is_success() || !body.ok {
            return Err(NotificationError::Api {
                status: status.as_u16(),
                description: body
                    .description
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").into()),
            });
        }
        Ok(body.result)
    }

    /// Send an HTML-formatted message to a chat.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotificationError> {
        let body = SendMessageBody {
            chat_id,
            text,
            parse_mode: "HTML",
        };
        let resp = self
            .http
            .post(self.method_url("sendMessage"))
            .timeout(Duration::from_secs(15))
            .json(&body)
            .send()
            .await?;

        Self::read_response::<serde_json::Value>(resp).await?;
        debug!(chat_id, "Telegram message sent");
        Ok(())
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, NotificationError> {
        let resp = self
            .http
            .get(format!(
                "{}?offset={offset}&timeout={timeout_secs}",
                self.method_url("getUpdates")
            ))
            .timeout(Duration::from_secs(timeout_secs + 10))
            .send()
            .await?;

        Ok(Self::read_response::<Vec<Update>>(resp)
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotificationError> {
        self.send_message(chat_id, text).await
    }
}
