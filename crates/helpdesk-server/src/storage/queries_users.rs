//! User queries.

use helpdesk_core::db::unix_timestamp;

use super::db::{DatabaseError, HelpdeskDatabase};
use super::models::{Role, User, UserSummary};

/// Parameters for inserting a user.
///
/// The role is not a parameter: it is computed by the insert itself.
pub struct NewUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub name: &'a str,
    pub password_hash: &'a str,
    pub telegram_id: Option<&'a str>,
}

impl HelpdeskDatabase {
    /// Create a new user.
    ///
    /// The role is decided inside the same statement as the insert: `ADMIN`
    /// when the table is empty, `USER` otherwise. `SQLite` serializes writers,
    /// so two concurrent first registrations cannot both observe zero rows.
    ///
    /// Fails with [`DatabaseError::Conflict`] when the email or telegram id
    /// is already taken.
    pub async fn create_user(&self, user: &NewUser<'_>) -> Result<User, DatabaseError> {
        let now = unix_timestamp();

        let created = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, password_hash, telegram_id, name, role, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, \
                     CASE WHEN (SELECT COUNT(*) FROM users) = 0 THEN 'ADMIN' ELSE 'USER' END, \
                     ?, ?) \
             RETURNING *",
        )
        .bind(user.id)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.telegram_id)
        .bind(user.name)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(created)
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    /// Get a user by email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    /// Get the user bound to a telegram id, if any.
    pub async fn get_user_by_telegram_id(
        &self,
        telegram_id: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE telegram_id = ?")
            .bind(telegram_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    /// Bind a telegram id to a user.
    ///
    /// The UNIQUE index on `telegram_id` is the enforcement point: binding an
    /// id held by another user fails with [`DatabaseError::Conflict`] and
    /// leaves both rows unchanged.
    pub async fn set_user_telegram_id(
        &self,
        id: &str,
        telegram_id: &str,
    ) -> Result<User, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query_as::<_, User>(
            "UPDATE users SET telegram_id = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(telegram_id)
        .bind(now)
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    /// Update a user's display name.
    pub async fn update_user_name(&self, id: &str, name: &str) -> Result<User, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query_as::<_, User>(
            "UPDATE users SET name = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(name)
        .bind(now)
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    /// Change a user's role.
    pub async fn update_user_role(&self, id: &str, role: Role) -> Result<User, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query_as::<_, User>(
            "UPDATE users SET role = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(role)
        .bind(now)
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    /// List all users with the number of tickets each one owns.
    pub async fn list_users(&self) -> Result<Vec<UserSummary>, DatabaseError> {
        let users = sqlx::query_as::<_, UserSummary>(
            "SELECT u.id, u.email, u.name, u.role, u.telegram_id, u.created_at, \
                    (SELECT COUNT(*) FROM tickets t WHERE t.user_id = u.id) AS ticket_count \
             FROM users u ORDER BY u.created_at ASC, u.rowid ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(users)
    }

    /// Count all users.
    pub async fn count_users(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await?;

        Ok(row.0)
    }
}
