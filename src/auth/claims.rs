/// Access token claims
///
/// The payload of a signed access token: subject, role and expiry
/// (plus the standard issued-at timestamp).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::models::{Role, User};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccessTokenClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// User role
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl AccessTokenClaims {
    /// Build claims for `user` expiring `ttl` from now. A non-positive `ttl`
    /// yields claims that are already expired.
    pub fn new(user: &User, ttl: chrono::Duration) -> Self {
        let now = chrono::Utc::now();
        Self {
            sub: user.id.to_string(),
            role: user.role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// Returns `InvalidToken` if the subject is not a UUID
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::InvalidToken))
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= chrono::Utc::now().timestamp()
    }
}
