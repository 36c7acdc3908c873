use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{Instrument, Span};

use super::lookup::UserLookup;
use super::with_deadline;
use crate::api::models::CreateUserRequest;
use crate::database::{NewUser, User, UserStore};
use crate::error::{AppError, StoreError};
use crate::utils::{FieldError, hash_password, normalize_email, validate_new_user};

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("password hashing aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<UserError> for AppError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::Store(e) => AppError::Store(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// 创建结果：校验错误作为数据返回，调用方必须显式检查
#[derive(Debug)]
pub enum CreateOutcome {
    Created(User),
    Invalid(Vec<FieldError>),
}

pub struct UserService {
    store: Arc<dyn UserStore>,
    lookup: Arc<dyn UserLookup>,
    hash_cost: u32,
    store_timeout: Duration,
    span: Span,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        lookup: Arc<dyn UserLookup>,
        hash_cost: u32,
        store_timeout: Duration,
        span: Span,
    ) -> Self {
        Self {
            store,
            lookup,
            hash_cost,
            store_timeout,
            span,
        }
    }

    /// 校验失败时不会写存储
    pub async fn create(&self, mut req: CreateUserRequest) -> Result<CreateOutcome, UserError> {
        req.name = req.name.trim().to_string();
        req.email = normalize_email(&req.email);

        let errors = validate_new_user(&req);
        if !errors.is_empty() {
            tracing::debug!(parent: &self.span, count = errors.len(), "create rejected by validation");
            return Ok(CreateOutcome::Invalid(errors));
        }

        self.insert(req).instrument(self.span.clone()).await
    }

    async fn insert(&self, req: CreateUserRequest) -> Result<CreateOutcome, UserError> {
        let cost = self.hash_cost;
        let password = req.password;
        let password_hash =
            tokio::task::spawn_blocking(move || hash_password(&password, cost)).await??;

        let new_user = NewUser {
            name: req.name,
            email: req.email,
            password_hash,
        };
        let user = with_deadline(self.store_timeout, self.store.create(new_user), || {
            StoreError::Timeout
        })
        .await?;

        // 清掉这个 id / 邮箱下可能残留的旧快照
        self.lookup.invalidate(&user).await;

        tracing::info!(user_id = user.id, "user created");
        Ok(CreateOutcome::Created(user))
    }

    pub async fn get(&self, id: u64) -> Result<Option<User>, StoreError> {
        self.lookup.get_by_id(id).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.lookup.get_by_email(&normalize_email(email)).await
    }
}
