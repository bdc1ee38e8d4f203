/// Storage capabilities consumed by the auth engine
///
/// Backends implement both traits and are selected when the service is
/// composed: [`PgStorage`] in production, [`InMemoryStorage`] for tests and
/// local runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{RefreshToken, User};

pub use memory::InMemoryStorage;
pub use postgres::PgStorage;

/// User directory
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `UniqueViolation` if the email is taken;
    /// the check and the insert are a single atomic step.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// Fails with `NotFound` when no user has this email
    async fn find_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Fails with `NotFound` when no user has this id
    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError>;
}

/// Refresh token store, keyed by the token string
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn save_token(&self, token: &RefreshToken) -> Result<(), StoreError>;

    /// Fails with `NotFound` when the token is unknown
    async fn get_token(&self, token: &str) -> Result<RefreshToken, StoreError>;

    /// Deleting an unknown token succeeds
    async fn delete_token(&self, token: &str) -> Result<(), StoreError>;

    /// Replace `old` with `new`.
    ///
    /// Backends without transactions fall back to saving `new` before deleting
    /// `old`: a failure in between leaves both tokens valid, never neither.
    async fn rotate_token(&self, old: &str, new: &RefreshToken) -> Result<(), StoreError> {
        self.save_token(new).await?;
        self.delete_token(old).await
    }
}
