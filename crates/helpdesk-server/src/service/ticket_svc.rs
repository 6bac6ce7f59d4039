//! Ticket lifecycle: creation, status transitions with handler assignment,
//! comments and listings.
//!
//! Every status is reachable from every other one. The handler always
//! mirrors the status: set to the acting staff member on `InProgress`,
//! cleared on anything else. Notifications go out after the write commits
//! and cannot affect the returned result.

use tracing::{info, instrument};

use super::account_svc::AccountDirectory;
use crate::auth::{Capability, Identity};
use crate::error::{ServiceError, ServiceResult};
use crate::notifications::{NotificationRelay, templates};
use crate::storage::{Comment, HelpdeskDatabase, NewTicket, Priority, Ticket, TicketStatus};

pub const TITLE_MIN_CHARS: usize = 5;
pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MIN_CHARS: usize = 10;

/// A ticket with its comments, oldest first.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TicketDetail {
    pub ticket: Ticket,
    pub comments: Vec<Comment>,
}

/// Check title and description bounds, counted in characters.
pub fn validate_new_ticket(title: &str, description: &str) -> ServiceResult<()> {
    let title_len = title.chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_len) {
        return Err(ServiceError::validation(format!(
            "Title must be between {TITLE_MIN_CHARS} and {TITLE_MAX_CHARS} characters"
        )));
    }
    if description.chars().count() < DESCRIPTION_MIN_CHARS {
        return Err(ServiceError::validation(format!(
            "Description must be at least {DESCRIPTION_MIN_CHARS} characters"
        )));
    }
    Ok(())
}

/// Handler for a ticket moved to `status` by `actor_id`.
pub fn handler_for(status: TicketStatus, actor_id: &str) -> Option<&str> {
    (status == TicketStatus::InProgress).then_some(actor_id)
}

#[derive(Clone)]
pub struct TicketLifecycle {
    db: HelpdeskDatabase,
    accounts: AccountDirectory,
    relay: NotificationRelay,
}

impl TicketLifecycle {
    pub const fn new(
        db: HelpdeskDatabase,
        accounts: AccountDirectory,
        relay: NotificationRelay,
    ) -> Self {
        Self {
            db,
            accounts,
            relay,
        }
    }

    /// Open a new ticket for `owner_id`. Priority defaults to `Medium`.
    #[instrument(skip(self, title, description))]
    pub async fn create(
        &self,
        owner_id: &str,
        title: &str,
        description: &str,
        priority: Option<Priority>,
    ) -> ServiceResult<Ticket> {
        validate_new_ticket(title, description)?;

        let id = uuid::Uuid::new_v4().to_string();
        let ticket = self
            .db
            .create_ticket(&NewTicket {
                id: &id,
                user_id: owner_id,
                title,
                description,
                priority: priority.unwrap_or_default(),
            })
            .await?;

        info!(ticket_id = %ticket.id, priority = %ticket.priority, "Ticket created");
        self.relay.notify(
            &ticket.user_id,
            templates::ticket_notice(&ticket, &templates::ticket_created()),
        );
        Ok(ticket)
    }

    /// Move a ticket to `status`. Staff only.
    #[instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn change_status(
        &self,
        actor: &Identity,
        ticket_id: &str,
        status: TicketStatus,
    ) -> ServiceResult<Ticket> {
        actor.authorize(Capability::ChangeTicketStatus)?;

        let handler_id = handler_for(status, &actor.user_id);
        let ticket = self
            .db
            .update_ticket_status(ticket_id, status, handler_id)
            .await?;

        info!(ticket_id, %status, handler_id = ?ticket.handler_id, "Ticket status changed");

        let handler_name = match ticket.handler_id.as_deref() {
            Some(id) => Some(self.accounts.display_name(id).await),
            None => None,
        };
        self.relay.notify(
            &ticket.user_id,
            templates::ticket_notice(
                &ticket,
                &templates::status_changed(status, handler_name.as_deref()),
            ),
        );
        Ok(ticket)
    }

    /// Append a comment. The owner is notified unless they wrote it.
    #[instrument(skip(self, actor, text), fields(actor_id = %actor.user_id))]
    pub async fn add_comment(
        &self,
        actor: &Identity,
        ticket_id: &str,
        text: &str,
    ) -> ServiceResult<Comment> {
        if text.trim().is_empty() {
            return Err(ServiceError::validation("Comment text must not be empty"));
        }

        let ticket = self.db.get_ticket(ticket_id).await?;
        let id = uuid::Uuid::new_v4().to_string();
        let comment = self
            .db
            .create_comment(&id, &ticket.id, &actor.user_id, text)
            .await?;

        info!(ticket_id, comment_id = %comment.id, "Comment added");

        if actor.user_id != ticket.user_id {
            let author = self.accounts.display_name(&actor.user_id).await;
            self.relay.notify(
                &ticket.user_id,
                templates::ticket_notice(&ticket, &templates::new_comment(&author, text)),
            );
        }
        Ok(comment)
    }

    /// Tickets owned by `user_id`, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> ServiceResult<Vec<Ticket>> {
        Ok(self.db.list_tickets_for_user(user_id, None).await?)
    }

    /// The `limit` most recent tickets owned by `user_id`.
    pub async fn list_recent_for_user(&self, user_id: &str, limit: u32) -> ServiceResult<Vec<Ticket>> {
        Ok(self.db.list_tickets_for_user(user_id, Some(limit)).await?)
    }

    /// Every ticket, newest first. Staff only.
    pub async fn list_all(&self, actor: &Identity) -> ServiceResult<Vec<Ticket>> {
        actor.authorize(Capability::ViewAllTickets)?;
        Ok(self.db.list_all_tickets().await?)
    }

    /// A ticket and its comments, visible to its owner and to staff.
    pub async fn get(&self, actor: &Identity, ticket_id: &str) -> ServiceResult<TicketDetail> {
        let ticket = self.db.get_ticket(ticket_id).await?;
        if ticket.user_id != actor.user_id {
            actor.authorize(Capability::ViewAnyTicket)?;
        }
        let comments = self.db.list_comments(&ticket.id).await?;
        Ok(TicketDetail { ticket, comments })
    }
}
