/// Auth Engine
///
/// Registration, login, logout, access token verification and refresh token
/// exchange/rotation. Holds no mutable state of its own: everything lives in
/// the injected stores, so one instance is shared across all workers.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::jwt::{issue_access_token, verify_access_token};
use crate::auth::password::PasswordHasher;
use crate::auth::refresh_token::generate_refresh_token;
use crate::configuration::{JwtSettings, RotationPolicy};
use crate::error::{AppError, AuthError, StoreError};
use crate::models::{RefreshToken, Role, TokenPair, User, UserProfile};
use crate::storage::{TokenRepository, UserRepository};

/// Result of [`AuthService::rotate_if_expired`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// A new token was stored and the old one removed
    Rotated(String),
    /// The presented token stays in use
    Unchanged(String),
}

impl RotationOutcome {
    pub fn token(&self) -> &str {
        match self {
            RotationOutcome::Rotated(token) | RotationOutcome::Unchanged(token) => token,
        }
    }

    pub fn is_rotated(&self) -> bool {
        matches!(self, RotationOutcome::Rotated(_))
    }
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenRepository>,
    hasher: Arc<dyn PasswordHasher>,
    settings: JwtSettings,
    store_timeout: Duration,
    /// Checked against on unknown-email logins so both failures cost a hash
    dummy_hash: Option<String>,
}

const DUMMY_PASSWORD: &str = "reauth-timing-equaliser";

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenRepository>,
        hasher: Arc<dyn PasswordHasher>,
        settings: JwtSettings,
        store_timeout: Duration,
    ) -> Self {
        let dummy_hash = match hasher.hash(DUMMY_PASSWORD) {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to prepare dummy password hash");
                None
            }
        };

        Self {
            users,
            tokens,
            hasher,
            settings,
            store_timeout,
            dummy_hash,
        }
    }

    pub fn settings(&self) -> &JwtSettings {
        &self.settings
    }

    /// Run a store call under the configured deadline
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    operation,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(StoreError::Timeout(operation.to_string()))
            }
        }
    }

    /// Create a user with role `user`
    ///
    /// # Errors
    /// - `UserAlreadyExists` when the email is taken (reported by the store)
    /// - `Password` when hashing fails
    pub async fn register(&self, email: &str, password: &str) -> Result<UserProfile, AppError> {
        let password_hash = self.hasher.hash(password).map_err(|e| {
            tracing::error!(error = %e, "Failed to hash password");
            e
        })?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            role: Role::User,
            created_at: now,
            updated_at: now,
        };

        match self.bounded("create_user", self.users.create_user(&user)).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(_)) => {
                return Err(AppError::Auth(AuthError::UserAlreadyExists));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to save new user");
                return Err(e.into());
            }
        }

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user.profile())
    }

    /// Check credentials and issue a token pair
    ///
    /// Unknown email and wrong password both fail with `Unauthorized`; the
    /// reason is only logged.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = match self.bounded("find_by_email", self.users.find_by_email(email)).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => {
                if let Some(hash) = &self.dummy_hash {
                    let _ = self.hasher.verify(hash, password);
                }
                tracing::warn!(reason = "user_not_found", "Login rejected");
                return Err(AppError::Auth(AuthError::Unauthorized));
            }
            Err(e) => return Err(e.into()),
        };

        if !self.hasher.verify(&user.password_hash, password)? {
            tracing::warn!(user_id = %user.id, reason = "invalid_password", "Login rejected");
            return Err(AppError::Auth(AuthError::Unauthorized));
        }

        let access_token = self.issue_access_token(&user)?;
        let refresh_token = self.store_new_refresh_token(user.id).await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.token,
        })
    }

    /// Forget a refresh token. Unknown tokens are not an error.
    ///
    /// The paired access token stays valid until it expires on its own.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        match self.bounded("delete_token", self.tokens.delete_token(refresh_token)).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {
                tracing::info!("Refresh token revoked");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Verify `token` and resolve its subject
    ///
    /// # Errors
    /// - `TokenExpired` for a correctly signed, expired token
    /// - `InvalidToken` for anything else the codec rejects
    /// - `Unauthorized` when the subject no longer exists
    pub async fn verify_access_token(&self, token: &str, secret: &str) -> Result<User, AppError> {
        let claims = verify_access_token(token, secret)?;
        let user_id = claims.user_id()?;

        match self.bounded("find_by_id", self.users.find_by_id(user_id)).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(user_id = %user_id, "Access token subject no longer exists");
                Err(AppError::Auth(AuthError::Unauthorized))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a refresh token and its owner
    ///
    /// # Errors
    /// - `InvalidToken` when the token is unknown or its stored expiry has passed
    /// - `Unauthorized` when the owner no longer exists
    pub async fn exchange_refresh(
        &self,
        refresh_token: &str,
    ) -> Result<(RefreshToken, User), AppError> {
        let record = match self.bounded("get_token", self.tokens.get_token(refresh_token)).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                tracing::warn!("Unknown refresh token presented");
                return Err(AppError::Auth(AuthError::InvalidToken));
            }
            Err(e) => return Err(e.into()),
        };

        if record.is_expired() {
            tracing::info!(user_id = %record.user_id, "Expired refresh token presented");
            if let Err(e) = self
                .bounded("delete_token", self.tokens.delete_token(refresh_token))
                .await
            {
                tracing::warn!(user_id = %record.user_id, error = %e, "Failed to purge expired refresh token");
            }
            return Err(AppError::Auth(AuthError::InvalidToken));
        }

        match self.bounded("find_by_id", self.users.find_by_id(record.user_id)).await {
            Ok(user) => Ok((record, user)),
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(user_id = %record.user_id, "Refresh token owner no longer exists");
                Err(AppError::Auth(AuthError::Unauthorized))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace `record` with a fresh token if it is due, otherwise keep it
    ///
    /// Under `RotationPolicy::OnExpiry` a token is due once it is past or
    /// within `rotation_window_hours` of its expiry; under
    /// `RotationPolicy::EveryUse` it is always due.
    pub async fn rotate_if_expired(
        &self,
        record: &RefreshToken,
        user_id: Uuid,
    ) -> Result<RotationOutcome, AppError> {
        let due = match self.settings.rotation {
            RotationPolicy::EveryUse => true,
            RotationPolicy::OnExpiry => record.expires_within(self.settings.rotation_window()),
        };

        if !due {
            return Ok(RotationOutcome::Unchanged(record.token.clone()));
        }

        let replacement = self.new_refresh_record(user_id)?;
        self.bounded(
            "rotate_token",
            self.tokens.rotate_token(&record.token, &replacement),
        )
        .await?;

        tracing::info!(user_id = %user_id, "Refresh token rotated");
        Ok(RotationOutcome::Rotated(replacement.token))
    }

    /// Exchange a refresh token for a new pair, rotating it when due
    pub async fn refresh(&self, refresh_token: &str) -> Result<(TokenPair, bool), AppError> {
        let (record, user) = self.exchange_refresh(refresh_token).await?;
        let outcome = self.rotate_if_expired(&record, user.id).await?;
        let access_token = self.issue_access_token(&user)?;
        let rotated = outcome.is_rotated();

        Ok((
            TokenPair {
                access_token,
                refresh_token: outcome.token().to_string(),
            },
            rotated,
        ))
    }

    /// Sign an access token for `user` with the configured lifetime
    pub fn issue_access_token(&self, user: &User) -> Result<String, AppError> {
        issue_access_token(
            user,
            self.settings.access_token_ttl(),
            &self.settings.access_secret,
        )
    }

    fn new_refresh_record(&self, user_id: Uuid) -> Result<RefreshToken, AppError> {
        let token = generate_refresh_token(self.settings.refresh_token_length)?;
        Ok(RefreshToken::new(
            user_id,
            token,
            Utc::now() + self.settings.refresh_token_ttl(),
        ))
    }

    async fn store_new_refresh_token(&self, user_id: Uuid) -> Result<RefreshToken, AppError> {
        let record = self.new_refresh_record(user_id)?;
        self.bounded("save_token", self.tokens.save_token(&record))
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to save refresh token");
                AppError::from(e)
            })?;
        Ok(record)
    }
}
