//! Account directory: user lookup, creation, channel binding and profile
//! management.

use tracing::{error, info, instrument, warn};

use crate::auth::password::{generate_password, hash_password, verify_password};
use crate::auth::{Capability, Identity};
use crate::error::{ServiceError, ServiceResult};
use crate::storage::{DatabaseError, HelpdeskDatabase, NewUser, Role, User, UserSummary};

pub const NAME_MIN_CHARS: usize = 2;
pub const PASSWORD_MIN_CHARS: usize = 6;

/// Domain of the synthetic email given to accounts created from the chat.
pub const SYNTHETIC_EMAIL_DOMAIN: &str = "telegram.user.local";

/// Chat profile data used to name accounts created from the chat channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelProfile {
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl ChannelProfile {
    /// Username if set, else "first last", else `user_<channel id>`.
    pub fn display_name(&self, channel_id: &str) -> String {
        if let Some(username) = self.username.as_deref().filter(|u| !u.trim().is_empty()) {
            return username.trim().to_string();
        }
        let full = match self.last_name.as_deref() {
            Some(last) => format!("{} {}", self.first_name.trim(), last.trim()),
            None => self.first_name.trim().to_string(),
        };
        let full = full.trim();
        if full.is_empty() {
            format!("user_{channel_id}")
        } else {
            full.to_string()
        }
    }
}

/// Login email for a chat-created account. The user id suffix keeps it
/// unique after the chat id is unbound and later registers again.
pub fn synthetic_email(channel_id: &str, user_id: &str) -> String {
    let suffix: String = user_id.chars().filter(char::is_ascii_alphanumeric).take(8).collect();
    format!("tg{channel_id}.{suffix}@{SYNTHETIC_EMAIL_DOMAIN}")
}

/// Loose `local@domain.tld` shape check.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

fn validate_name(name: &str) -> ServiceResult<&str> {
    let name = name.trim();
    if name.chars().count() < NAME_MIN_CHARS {
        return Err(ServiceError::validation(format!(
            "Name must be at least {NAME_MIN_CHARS} characters"
        )));
    }
    Ok(name)
}

fn hash_secret(secret: &str) -> ServiceResult<String> {
    hash_password(secret).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ServiceError::Internal
    })
}

/// An account created from the chat channel together with its one-time
/// plaintext password.
pub struct ProvisionedAccount {
    pub user: User,
    pub password: String,
}

/// Owns user records. Cheap to clone.
#[derive(Clone)]
pub struct AccountDirectory {
    db: HelpdeskDatabase,
}

impl AccountDirectory {
    pub const fn new(db: HelpdeskDatabase) -> Self {
        Self { db }
    }

    pub async fn get(&self, user_id: &str) -> ServiceResult<User> {
        Ok(self.db.get_user(user_id).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        Ok(self.db.get_user_by_email(email).await?)
    }

    pub async fn find_by_channel(&self, channel_id: &str) -> ServiceResult<Option<User>> {
        Ok(self.db.get_user_by_telegram_id(channel_id).await?)
    }

    /// Name shown to other users: display name, else email, else "a user".
    pub async fn display_name(&self, user_id: &str) -> String {
        match self.db.get_user(user_id).await {
            Ok(user) if !user.name.trim().is_empty() => user.name,
            Ok(user) if !user.email.is_empty() => user.email,
            Ok(_) => "a user".to_string(),
            Err(e) if e.is_not_found() => "a user".to_string(),
            Err(e) => {
                warn!(user_id, error = %e, "Cannot resolve user name");
                "a user".to_string()
            }
        }
    }

    /// Register with email and password.
    #[instrument(skip(self, name, password), fields(op = "register"))]
    pub async fn register(&self, name: &str, email: &str, password: &str) -> ServiceResult<User> {
        let name = validate_name(name)?;
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(ServiceError::validation("Invalid email address"));
        }
        if password.chars().count() < PASSWORD_MIN_CHARS {
            return Err(ServiceError::validation(format!(
                "Password must be at least {PASSWORD_MIN_CHARS} characters"
            )));
        }

        if self.db.get_user_by_email(email).await?.is_some() {
            return Err(ServiceError::Conflict(
                "A user with this email already exists".into(),
            ));
        }

        let hash = hash_secret(password)?;
        let id = uuid::Uuid::new_v4().to_string();
        let user = self
            .db
            .create_user(&NewUser {
                id: &id,
                email,
                name,
                password_hash: &hash,
                telegram_id: None,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => {
                    ServiceError::Conflict("A user with this email already exists".into())
                }
                other => other.into(),
            })?;

        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Check an email/password pair.
    #[instrument(skip(self, password), fields(op = "authenticate"))]
    pub async fn authenticate(&self, email: &str, password: &str) -> ServiceResult<User> {
        let invalid = || ServiceError::Unauthorized("Invalid credentials".into());

        let user = self
            .db
            .get_user_by_email(email.trim())
            .await?
            .ok_or_else(invalid)?;
        let hash = user.password_hash.as_deref().ok_or_else(invalid)?;

        let valid = verify_password(password, hash).map_err(|e| {
            error!(user_id = %user.id, error = %e, "Password verification failed");
            ServiceError::Internal
        })?;
        if !valid {
            warn!(user_id = %user.id, "Failed login attempt");
            return Err(invalid());
        }

        Ok(user)
    }

    pub async fn get_profile(&self, user_id: &str) -> ServiceResult<User> {
        self.get(user_id).await
    }

    /// Update the caller's own profile. `None` leaves it unchanged.
    #[instrument(skip(self, name))]
    pub async fn update_profile(&self, user_id: &str, name: Option<&str>) -> ServiceResult<User> {
        let Some(name) = name else {
            return self.get(user_id).await;
        };
        let name = validate_name(name)?;
        let user = self.db.update_user_name(user_id, name).await?;
        info!(user_id, "Profile updated");
        Ok(user)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn update_user_role(
        &self,
        actor: &Identity,
        user_id: &str,
        role: Role,
    ) -> ServiceResult<User> {
        actor.authorize(Capability::ManageRoles)?;
        let user = self.db.update_user_role(user_id, role).await?;
        info!(user_id, %role, "User role changed");
        Ok(user)
    }

    pub async fn list_users(&self, actor: &Identity) -> ServiceResult<Vec<UserSummary>> {
        actor.authorize(Capability::ListUsers)?;
        Ok(self.db.list_users().await?)
    }

    /// Bind a chat channel id to `user_id`.
    ///
    /// Fails with [`ServiceError::ChannelAlreadyLinked`] when another user
    /// holds the id; rebinding the same user is a no-op.
    #[instrument(skip(self))]
    pub async fn bind_channel(&self, user_id: &str, channel_id: &str) -> ServiceResult<User> {
        if let Some(holder) = self.db.get_user_by_telegram_id(channel_id).await? {
            if holder.id == user_id {
                return Ok(holder);
            }
            return Err(ServiceError::ChannelAlreadyLinked);
        }

        let user = self
            .db
            .set_user_telegram_id(user_id, channel_id)
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => ServiceError::ChannelAlreadyLinked,
                other => other.into(),
            })?;

        info!(user_id, "Chat channel linked");
        Ok(user)
    }

    /// Create an account owned by a chat channel, with a synthetic email and
    /// a random password returned once in plaintext.
    ///
    /// A unique violation surfaces as [`ServiceError::ChannelAlreadyLinked`]
    /// only when another account now holds the channel id.
    #[instrument(skip(self, profile))]
    pub async fn create_channel_account(
        &self,
        channel_id: &str,
        profile: &ChannelProfile,
    ) -> ServiceResult<ProvisionedAccount> {
        let password = generate_password();
        let hash = hash_secret(&password)?;
        let id = uuid::Uuid::new_v4().to_string();
        let email = synthetic_email(channel_id, &id);
        let name = profile.display_name(channel_id);

        let created = self
            .db
            .create_user(&NewUser {
                id: &id,
                email: &email,
                name: &name,
                password_hash: &hash,
                telegram_id: Some(channel_id),
            })
            .await;

        let user = match created {
            Ok(user) => user,
            Err(e) if e.is_conflict() => {
                if self.db.get_user_by_telegram_id(channel_id).await?.is_some() {
                    return Err(ServiceError::ChannelAlreadyLinked);
                }
                warn!(error = %e, "Chat account creation hit an unrelated unique constraint");
                return Err(ServiceError::Conflict("Account could not be created".into()));
            }
            Err(e) => return Err(e.into()),
        };

        info!(user_id = %user.id, role = %user.role, "Account created from chat channel");
        Ok(ProvisionedAccount { user, password })
    }
}
