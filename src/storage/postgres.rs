/// Postgres backend
///
/// Refresh tokens are stored as SHA-256 digests; the plaintext only lives
/// with the client. Lookups hash the presented token and return a record
/// carrying the presented plaintext.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::hash_token;
use crate::error::StoreError;
use crate::models::{RefreshToken, Role, User};
use crate::storage::{TokenRepository, UserRepository};

type UserRow = (Uuid, String, String, String, DateTime<Utc>, DateTime<Utc>);

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: UserRow) -> Result<User, StoreError> {
    let (id, email, password_hash, role, created_at, updated_at) = row;
    let role = role.parse::<Role>().map_err(StoreError::Unexpected)?;

    Ok(User {
        id,
        email,
        password_hash,
        role,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl UserRepository for PgStorage {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("user".to_string()))?;

        user_from_row(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("user".to_string()))?;

        user_from_row(row)
    }
}

#[async_trait]
impl TokenRepository for PgStorage {
    async fn save_token(&self, token: &RefreshToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(hash_token(&token.token))
        .bind(token.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<RefreshToken, StoreError> {
        let (id, user_id, expires_at) = sqlx::query_as::<_, (Uuid, Uuid, DateTime<Utc>)>(
            r#"
            SELECT id, user_id, expires_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("refresh token".to_string()))?;

        Ok(RefreshToken {
            id,
            user_id,
            token: token.to_string(),
            expires_at,
        })
    }

    async fn delete_token(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn rotate_token(&self, old: &str, new: &RefreshToken) -> Result<(), StoreError> {
        let mut transaction = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(new.id)
        .bind(new.user_id)
        .bind(hash_token(&new.token))
        .bind(new.expires_at)
        .bind(Utc::now())
        .execute(&mut transaction)
        .await?;

        sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(hash_token(old))
            .execute(&mut transaction)
            .await?;

        transaction.commit().await?;
        Ok(())
    }
}
