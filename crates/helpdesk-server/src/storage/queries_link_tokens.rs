//! Link token queries.
//!
//! Tokens are looked up by the SHA-256 digest of their raw value; the raw
//! value never reaches the database.

use helpdesk_core::db::unix_timestamp;

use super::db::{DatabaseError, HelpdeskDatabase};
use super::models::LinkToken;

impl HelpdeskDatabase {
    /// Store a new, unused link token.
    pub async fn create_link_token(
        &self,
        id: &str,
        token_hash: &str,
        email: Option<&str>,
        expires_at: i64,
    ) -> Result<LinkToken, DatabaseError> {
        let now = unix_timestamp();

        let token = sqlx::query_as::<_, LinkToken>(
            "INSERT INTO link_tokens (id, token_hash, email, expires_at, used, created_at) \
             VALUES (?, ?, ?, ?, 0, ?) RETURNING *",
        )
        .bind(id)
        .bind(token_hash)
        .bind(email)
        .bind(expires_at)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(token)
    }

    /// Get a token by digest regardless of its state.
    #[cfg(test)]
    pub async fn get_link_token(&self, token_hash: &str) -> Result<Option<LinkToken>, DatabaseError> {
        let token = sqlx::query_as::<_, LinkToken>("SELECT * FROM link_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(self.pool())
            .await?;

        Ok(token)
    }

    /// Atomically consume a token.
    ///
    /// Marks the token used only if it is unused and not expired at `now`,
    /// returning the consumed row. Of any number of concurrent callers with
    /// the same digest at most one gets `Some`. A `None` leaves the row
    /// untouched.
    pub async fn claim_link_token(
        &self,
        token_hash: &str,
        now: i64,
    ) -> Result<Option<LinkToken>, DatabaseError> {
        let token = sqlx::query_as::<_, LinkToken>(
            "UPDATE link_tokens SET used = 1 \
             WHERE token_hash = ? AND used = 0 AND expires_at > ? RETURNING *",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;

        Ok(token)
    }

    /// Delete tokens that expired before `now`. Returns the number removed.
    pub async fn purge_expired_link_tokens(&self, now: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM link_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
