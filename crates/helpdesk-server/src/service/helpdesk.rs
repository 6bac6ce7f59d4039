//! Transport-agnostic operation surface.
//!
//! Each operation takes the caller's identity as reported by the session
//! layer, `None` for anonymous callers. Protected operations reject
//! anonymous callers with `Unauthorized` before touching storage.

use std::sync::Arc;

use tracing::{error, info, instrument};

use super::account_svc::{AccountDirectory, ChannelProfile};
use super::link_svc::{IdentityLinker, IssuedLinkToken, Redemption};
use super::ticket_svc::{TicketDetail, TicketLifecycle};
use crate::auth::{Identity, Session, SessionManager};
use crate::error::{ServiceError, ServiceResult};
use crate::notifications::NotificationRelay;
use crate::storage::{
    Comment, HelpdeskDatabase, Priority, Role, Ticket, TicketStatus, User, UserSummary,
};

/// Signed-in chat user together with a session for the web console.
#[derive(Debug, Clone)]
pub struct ChannelLogin {
    pub user: User,
    pub session: Session,
}

fn require(identity: Option<&Identity>) -> ServiceResult<&Identity> {
    identity.ok_or_else(ServiceError::unauthenticated)
}

#[derive(Clone)]
pub struct Helpdesk {
    accounts: AccountDirectory,
    tickets: TicketLifecycle,
    linker: IdentityLinker,
    sessions: Arc<SessionManager>,
}

impl Helpdesk {
    pub fn new(
        db: HelpdeskDatabase,
        relay: NotificationRelay,
        sessions: Arc<SessionManager>,
        link_token_ttl_secs: i64,
    ) -> Self {
        let accounts = AccountDirectory::new(db.clone());
        let tickets = TicketLifecycle::new(db.clone(), accounts.clone(), relay.clone());
        let linker = IdentityLinker::new(db, accounts.clone(), relay, link_token_ttl_secs);
        Self {
            accounts,
            tickets,
            linker,
            sessions,
        }
    }

    pub const fn accounts(&self) -> &AccountDirectory {
        &self.accounts
    }

    pub const fn tickets(&self) -> &TicketLifecycle {
        &self.tickets
    }

    pub const fn linker(&self) -> &IdentityLinker {
        &self.linker
    }

    /// Resolve an `Authorization` header value to an identity.
    pub fn identify(&self, authorization: Option<&str>) -> ServiceResult<Identity> {
        self.sessions.identify(authorization)
    }

    fn open_session(&self, user: &User) -> ServiceResult<Session> {
        self.sessions.issue(user).map_err(|e| {
            error!(user_id = %user.id, error = %e, "Session issuance failed");
            ServiceError::Internal
        })
    }

    // --- Tickets ---

    pub async fn create_ticket(
        &self,
        identity: Option<&Identity>,
        title: &str,
        description: &str,
        priority: Option<Priority>,
    ) -> ServiceResult<Ticket> {
        let identity = require(identity)?;
        self.tickets
            .create(&identity.user_id, title, description, priority)
            .await
    }

    pub async fn change_ticket_status(
        &self,
        identity: Option<&Identity>,
        ticket_id: &str,
        status: TicketStatus,
    ) -> ServiceResult<Ticket> {
        let identity = require(identity)?;
        self.tickets.change_status(identity, ticket_id, status).await
    }

    pub async fn add_comment(
        &self,
        identity: Option<&Identity>,
        ticket_id: &str,
        text: &str,
    ) -> ServiceResult<Comment> {
        let identity = require(identity)?;
        self.tickets.add_comment(identity, ticket_id, text).await
    }

    pub async fn list_my_tickets(&self, identity: Option<&Identity>) -> ServiceResult<Vec<Ticket>> {
        let identity = require(identity)?;
        self.tickets.list_for_user(&identity.user_id).await
    }

    pub async fn list_all_tickets(&self, identity: Option<&Identity>) -> ServiceResult<Vec<Ticket>> {
        let identity = require(identity)?;
        self.tickets.list_all(identity).await
    }

    pub async fn get_ticket(
        &self,
        identity: Option<&Identity>,
        ticket_id: &str,
    ) -> ServiceResult<TicketDetail> {
        let identity = require(identity)?;
        self.tickets.get(identity, ticket_id).await
    }

    // --- Chat linking ---

    /// Anonymous callers may only request registration tokens. A link token
    /// can only target the caller's own account, so an anonymous link-mode
    /// request fails with `Unauthorized` and a request for someone else's
    /// email with `Forbidden`. This is stricter than the public token
    /// endpoint it replaces, which issued link tokens for any known email.
    pub async fn issue_link_token(
        &self,
        identity: Option<&Identity>,
        email: Option<&str>,
    ) -> ServiceResult<IssuedLinkToken> {
        if let Some(email) = email {
            let identity = require(identity)?;
            let owner = self
                .accounts
                .find_by_email(email.trim())
                .await?
                .ok_or_else(|| ServiceError::not_found("User"))?;
            if owner.id != identity.user_id {
                return Err(ServiceError::Forbidden(
                    "You can only link your own account".into(),
                ));
            }
        }
        self.linker.issue_link_token(email).await
    }

    pub async fn redeem_link_token(
        &self,
        token: &str,
        channel_id: &str,
        profile: &ChannelProfile,
    ) -> ServiceResult<Redemption> {
        self.linker
            .redeem_link_token(token, channel_id, profile)
            .await
    }

    /// Sign in from the chat mini-app, registering on first use.
    #[instrument(skip(self, profile))]
    pub async fn login_or_register_by_secondary_id(
        &self,
        channel_id: &str,
        profile: &ChannelProfile,
    ) -> ServiceResult<ChannelLogin> {
        let user = self
            .linker
            .login_or_register_by_secondary_id(channel_id, profile)
            .await?;
        let session = self.open_session(&user)?;
        Ok(ChannelLogin { user, session })
    }

    // --- Accounts ---

    pub async fn register(&self, name: &str, email: &str, password: &str) -> ServiceResult<User> {
        self.accounts.register(name, email, password).await
    }

    /// Password login. Returns a session token for later calls.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<Session> {
        let user = self.accounts.authenticate(email, password).await?;
        let session = self.open_session(&user)?;
        info!(user_id = %user.id, "User logged in");
        Ok(session)
    }

    pub async fn get_profile(&self, identity: Option<&Identity>) -> ServiceResult<User> {
        let identity = require(identity)?;
        self.accounts.get_profile(&identity.user_id).await
    }

    pub async fn update_profile(
        &self,
        identity: Option<&Identity>,
        name: Option<&str>,
    ) -> ServiceResult<User> {
        let identity = require(identity)?;
        self.accounts.update_profile(&identity.user_id, name).await
    }

    pub async fn update_user_role(
        &self,
        identity: Option<&Identity>,
        user_id: &str,
        role: Role,
    ) -> ServiceResult<User> {
        let identity = require(identity)?;
        self.accounts.update_user_role(identity, user_id, role).await
    }

    pub async fn list_users(&self, identity: Option<&Identity>) -> ServiceResult<Vec<UserSummary>> {
        let identity = require(identity)?;
        self.accounts.list_users(identity).await
    }
}
