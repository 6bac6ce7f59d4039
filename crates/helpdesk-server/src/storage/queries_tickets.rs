//! Ticket and comment queries.

use helpdesk_core::db::unix_timestamp;

use super::db::{DatabaseError, HelpdeskDatabase};
use super::models::{Comment, Priority, Ticket, TicketStatus};

/// Parameters for inserting a ticket. New tickets are always `PENDING`.
pub struct NewTicket<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub priority: Priority,
}

impl HelpdeskDatabase {
    // =========================================================================
    // Ticket queries
    // =========================================================================

    /// Create a new ticket in `PENDING` status with no handler.
    pub async fn create_ticket(&self, ticket: &NewTicket<'_>) -> Result<Ticket, DatabaseError> {
        let now = unix_timestamp();

        let created = sqlx::query_as::<_, Ticket>(
            "INSERT INTO tickets (id, title, description, status, priority, user_id, handler_id, created_at, updated_at) \
             VALUES (?, ?, ?, 'PENDING', ?, ?, NULL, ?, ?) RETURNING *",
        )
        .bind(ticket.id)
        .bind(ticket.title)
        .bind(ticket.description)
        .bind(ticket.priority)
        .bind(ticket.user_id)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(created)
    }

    /// Get a ticket by ID.
    pub async fn get_ticket(&self, id: &str) -> Result<Ticket, DatabaseError> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Ticket {id}")))
    }

    /// Set status and handler in one statement.
    ///
    /// The schema rejects a handler that disagrees with the status, so the
    /// row can never be observed violating the `IN_PROGRESS` invariant.
    pub async fn update_ticket_status(
        &self,
        id: &str,
        status: TicketStatus,
        handler_id: Option<&str>,
    ) -> Result<Ticket, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query_as::<_, Ticket>(
            "UPDATE tickets SET status = ?, handler_id = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(status)
        .bind(handler_id)
        .bind(now)
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Ticket {id}")))
    }

    /// List tickets owned by a user, newest first.
    pub async fn list_tickets_for_user(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Ticket>, DatabaseError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit.map_or(-1, i64::from))
        .fetch_all(self.pool())
        .await?;

        Ok(tickets)
    }

    /// List every ticket, newest first.
    pub async fn list_all_tickets(&self) -> Result<Vec<Ticket>, DatabaseError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(tickets)
    }

    // =========================================================================
    // Comment queries
    // =========================================================================

    /// Append a comment to a ticket.
    pub async fn create_comment(
        &self,
        id: &str,
        ticket_id: &str,
        author_id: &str,
        text: &str,
    ) -> Result<Comment, DatabaseError> {
        let now = unix_timestamp();

        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (id, ticket_id, author_id, text, created_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(id)
        .bind(ticket_id)
        .bind(author_id)
        .bind(text)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(comment)
    }

    /// List comments for a ticket in the order they were written.
    pub async fn list_comments(&self, ticket_id: &str) -> Result<Vec<Comment>, DatabaseError> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments WHERE ticket_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(ticket_id)
        .fetch_all(self.pool())
        .await?;

        Ok(comments)
    }
}
