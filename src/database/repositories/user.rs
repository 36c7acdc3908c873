use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::models::user::{NewUser, User};
use crate::error::StoreError;

/// 用户持久化接口，邮箱唯一性、ID 和时间戳都由存储负责
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: u64) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

/// Postgres 实现
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        tracing::debug!("Creating user: {}", user.email);

        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => {
                tracing::info!("Created user: {}", user.id);
                Ok(user)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::warn!("Email already registered: {}", user.email);
                Err(StoreError::Conflict)
            }
            Err(e) => {
                tracing::error!("Failed to create user: {:?}", e);
                Err(e.into())
            }
        }
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<User>, StoreError> {
        // BIGSERIAL 以外的 id 不可能存在
        let Ok(id) = i64::try_from(id) else {
            return Ok(None);
        };

        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
