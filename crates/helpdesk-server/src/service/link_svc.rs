//! Chat account linking.
//!
//! A link token is a short-lived single-use secret. With an email it binds
//! the redeeming chat to that existing account ("link" mode); without one it
//! provisions a fresh account owned by the chat ("register" mode). Only the
//! SHA-256 digest of the token is stored.
//!
//! Redemption claims the token with one conditional UPDATE before anything
//! else happens, so of two concurrent redeemers exactly one proceeds, and a
//! token that passed the claim stays used even if binding then fails.

use helpdesk_core::db::unix_timestamp;
use tracing::{info, instrument};

use super::account_svc::{AccountDirectory, ChannelProfile, ProvisionedAccount};
use crate::auth::{hash_token, password};
use crate::error::{ServiceError, ServiceResult};
use crate::notifications::{NotificationRelay, templates};
use crate::storage::{HelpdeskDatabase, User};

/// Bytes of entropy in a link token (hex encoded to twice as many chars).
pub const LINK_TOKEN_BYTES: usize = 16;

/// Prefix of the bot deep-link payload carrying a token.
pub const DEEP_LINK_PREFIX: &str = "auth_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Bind the chat to the account owning the token's email.
    Link,
    /// Create a new account for the chat.
    Register,
}

/// A freshly issued token. `token` is the only copy of the raw secret.
#[derive(Debug, Clone)]
pub struct IssuedLinkToken {
    pub token: String,
    pub expires_at: i64,
    pub mode: LinkMode,
}

impl IssuedLinkToken {
    /// `start` payload for a Telegram deep link.
    pub fn deep_link_payload(&self) -> String {
        format!("{DEEP_LINK_PREFIX}{}", self.token)
    }
}

/// Outcome of a successful redemption.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub user: User,
    pub created: bool,
}

fn validate_channel_id(channel_id: &str) -> ServiceResult<()> {
    if channel_id.trim().is_empty() {
        return Err(ServiceError::validation("Chat id must not be empty"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct IdentityLinker {
    db: HelpdeskDatabase,
    accounts: AccountDirectory,
    relay: NotificationRelay,
    token_ttl_secs: i64,
}

impl IdentityLinker {
    pub const fn new(
        db: HelpdeskDatabase,
        accounts: AccountDirectory,
        relay: NotificationRelay,
        token_ttl_secs: i64,
    ) -> Self {
        Self {
            db,
            accounts,
            relay,
            token_ttl_secs,
        }
    }

    /// Issue a token. With `email` it links that existing account.
    #[instrument(skip(self))]
    pub async fn issue_link_token(&self, email: Option<&str>) -> ServiceResult<IssuedLinkToken> {
        let email = email.map(str::trim);
        if let Some(email) = email
            && self.accounts.find_by_email(email).await?.is_none()
        {
            return Err(ServiceError::not_found("User"));
        }

        let token = password::random_hex(LINK_TOKEN_BYTES);
        let expires_at = unix_timestamp() + self.token_ttl_secs;
        let id = uuid::Uuid::new_v4().to_string();
        self.db
            .create_link_token(&id, &hash_token(&token), email, expires_at)
            .await?;

        let mode = if email.is_some() {
            LinkMode::Link
        } else {
            LinkMode::Register
        };
        info!(token_id = %id, ?mode, expires_at, "Link token issued");
        Ok(IssuedLinkToken {
            token,
            expires_at,
            mode,
        })
    }

    /// Redeem a token from the chat identified by `channel_id`.
    #[instrument(skip(self, token, profile))]
    pub async fn redeem_link_token(
        &self,
        token: &str,
        channel_id: &str,
        profile: &ChannelProfile,
    ) -> ServiceResult<Redemption> {
        validate_channel_id(channel_id)?;

        let claimed = self
            .db
            .claim_link_token(&hash_token(token.trim()), unix_timestamp())
            .await?
            .ok_or(ServiceError::InvalidToken)?;
        info!(
            token_id = %claimed.id,
            registration = claimed.is_registration(),
            "Link token claimed"
        );

        match claimed.email.as_deref() {
            Some(email) => {
                let user = self
                    .accounts
                    .find_by_email(email)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("User"))?;
                let user = self.accounts.bind_channel(&user.id, channel_id).await?;
                Ok(Redemption {
                    user,
                    created: false,
                })
            }
            None => {
                if self.accounts.find_by_channel(channel_id).await?.is_some() {
                    return Err(ServiceError::ChannelAlreadyLinked);
                }
                let user = self.provision(channel_id, profile).await?;
                Ok(Redemption {
                    user,
                    created: true,
                })
            }
        }
    }

    /// Return the account bound to `channel_id`, creating it on first use.
    ///
    /// Safe to repeat: the channel id is the idempotency key. When two calls
    /// race on a new channel, the loser re-reads and returns the winner's row.
    #[instrument(skip(self, profile))]
    pub async fn login_or_register_by_secondary_id(
        &self,
        channel_id: &str,
        profile: &ChannelProfile,
    ) -> ServiceResult<User> {
        validate_channel_id(channel_id)?;

        if let Some(user) = self.accounts.find_by_channel(channel_id).await? {
            return Ok(user);
        }

        match self.provision(channel_id, profile).await {
            Ok(user) => Ok(user),
            Err(ServiceError::ChannelAlreadyLinked) => self
                .accounts
                .find_by_channel(channel_id)
                .await?
                .ok_or_else(|| ServiceError::Conflict("Chat account is being registered".into())),
            Err(e) => Err(e),
        }
    }

    /// Create a chat-owned account and send it its one-time credentials.
    async fn provision(&self, channel_id: &str, profile: &ChannelProfile) -> ServiceResult<User> {
        let ProvisionedAccount { user, password } = self
            .accounts
            .create_channel_account(channel_id, profile)
            .await?;

        self.relay
            .notify(&user.id, templates::credentials(&user.email, &password));
        Ok(user)
    }
}
