/// Domain records shared by the auth engine, the stores and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A stored user account. Carries the password hash, so it is not serializable;
/// hand out [`UserProfile`] instead.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }
}

/// The public view of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// A stored refresh token. `token` is the lookup key.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn new(user_id: Uuid, token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// True when the token expires within `window` from now (or already has)
    pub fn expires_within(&self, window: chrono::Duration) -> bool {
        self.expires_at <= Utc::now() + window
    }
}

/// Access/refresh token pair handed to a client after login or refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_role_round_trips_through_text() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.to_string(), "user");
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_profile_omits_password_hash() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&user.profile()).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_refresh_token_expiry_checks() {
        let expired = RefreshToken::new(Uuid::new_v4(), "t".into(), Utc::now() - Duration::seconds(1));
        let fresh = RefreshToken::new(Uuid::new_v4(), "t".into(), Utc::now() + Duration::days(7));

        assert!(expired.is_expired());
        assert!(!fresh.is_expired());
        assert!(!fresh.expires_within(Duration::hours(24)));
        assert!(fresh.expires_within(Duration::days(8)));
    }
}
