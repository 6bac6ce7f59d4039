//! Session token issuance and validation.
//!
//! The session layer is the identity provider of the helpdesk: a valid
//! bearer token yields an [`Identity`], anything else is `Unauthorized`.

use helpdesk_core::db::unix_timestamp;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};

use super::Identity;
use super::claims::Claims;
use crate::error::{ServiceError, ServiceResult};
use crate::storage::User;

/// A freshly issued session token.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub expires_at: i64,
    pub identity: Identity,
}

/// Issues and validates HS256 session tokens.
#[derive(Clone)]
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl SessionManager {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    /// Issue a session for the given user.
    pub fn issue(&self, user: &User) -> Result<Session, jsonwebtoken::errors::Error> {
        let now = unix_timestamp();
        let exp = now + self.ttl_secs;

        let claims = Claims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: user.id.clone(),
            role: user.role,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(Session {
            token,
            expires_at: exp,
            identity: Identity::new(&user.id, user.role),
        })
    }

    /// Validate a token and return its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data =
            jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(data.claims)
    }

    /// Resolve an `Authorization` header value (`Bearer <token>`) to an identity.
    pub fn identify(&self, authorization: Option<&str>) -> ServiceResult<Identity> {
        let token = authorization
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ServiceError::Unauthorized("Missing authorization header".into()))?;

        let claims = self
            .validate(token)
            .map_err(|_| ServiceError::Unauthorized("Invalid session token".into()))?;

        Ok(Identity::new(&claims.sub, claims.role))
    }
}

/// Hex SHA-256 digest of a secret, for storage (raw secrets are never stored).
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
