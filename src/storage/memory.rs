use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{RefreshToken, User};
use crate::storage::{TokenRepository, UserRepository};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    emails: HashMap<String, Uuid>,
    tokens: HashMap<String, RefreshToken>,
}

/// Process-local store. Every operation runs under one lock, so unique-email
/// inserts and token rotation are atomic.
#[derive(Default)]
pub struct InMemoryStorage {
    tables: Mutex<Tables>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, operation: &str) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unexpected(format!("{}: storage lock poisoned", operation)))
    }

    /// Remove a user, leaving their refresh tokens behind
    pub fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.lock("delete_user")?;
        if let Some(user) = tables.users.remove(&id) {
            tables.emails.remove(&user.email);
        }
        Ok(())
    }

    pub fn token_count(&self) -> usize {
        self.lock("token_count").map(|t| t.tokens.len()).unwrap_or(0)
    }
}

#[async_trait]
impl UserRepository for InMemoryStorage {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.lock("create_user")?;
        if tables.emails.contains_key(&user.email) {
            return Err(StoreError::UniqueViolation("users.email".to_string()));
        }
        tables.emails.insert(user.email.clone(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let tables = self.lock("find_by_email")?;
        tables
            .emails
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let tables = self.lock("find_by_id")?;
        tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".to_string()))
    }
}

#[async_trait]
impl TokenRepository for InMemoryStorage {
    async fn save_token(&self, token: &RefreshToken) -> Result<(), StoreError> {
        let mut tables = self.lock("save_token")?;
        if tables.tokens.contains_key(&token.token) {
            return Err(StoreError::UniqueViolation("refresh_tokens.token".to_string()));
        }
        tables.tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<RefreshToken, StoreError> {
        let tables = self.lock("get_token")?;
        tables
            .tokens
            .get(token)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("refresh token".to_string()))
    }

    async fn delete_token(&self, token: &str) -> Result<(), StoreError> {
        let mut tables = self.lock("delete_token")?;
        tables.tokens.remove(token);
        Ok(())
    }

    async fn rotate_token(&self, old: &str, new: &RefreshToken) -> Result<(), StoreError> {
        let mut tables = self.lock("rotate_token")?;
        if tables.tokens.contains_key(&new.token) {
            return Err(StoreError::UniqueViolation("refresh_tokens.token".to_string()));
        }
        tables.tokens.remove(old);
        tables.tokens.insert(new.token.clone(), new.clone());
        Ok(())
    }
}
