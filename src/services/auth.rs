use std::sync::Arc;

use thiserror::Error;
use tracing::{Instrument, Span};

use super::lookup::UserLookup;
use super::token::{Identity, IssuedToken, TokenError, TokenService};
use crate::error::StoreError;
use crate::utils::{normalize_email, verify_password};

/// 认证失败的具体原因，只用于日志；对外统一返回同一条消息
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no user with this email")]
    UnknownEmail,
    #[error("password mismatch")]
    WrongPassword,
    #[error("stored password hash is unreadable: {0}")]
    BadHash(#[from] bcrypt::BcryptError),
    #[error("password check aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl AuthError {
    pub const PUBLIC_MESSAGE: &'static str = "incorrect email or password";

    /// 签名失败是服务端问题，其余都是认证失败
    pub fn is_rejection(&self) -> bool {
        !matches!(self, AuthError::Token(TokenError::Signing(_)))
    }
}

pub struct AuthService {
    lookup: Arc<dyn UserLookup>,
    tokens: TokenService,
    span: Span,
}

impl AuthService {
    pub fn new(lookup: Arc<dyn UserLookup>, tokens: TokenService, span: Span) -> Self {
        Self {
            lookup,
            tokens,
            span,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        let result = self
            .check_credentials(&email, password)
            .instrument(self.span.clone())
            .await;

        match &result {
            Ok(identity) => {
                tracing::info!(parent: &self.span, user_id = identity.id, "user authenticated")
            }
            Err(AuthError::Store(e)) => {
                tracing::error!(parent: &self.span, error = %e, "login failed on store error")
            }
            Err(e) => tracing::warn!(parent: &self.span, email = %email, reason = %e, "login rejected"),
        }
        result
    }

    async fn check_credentials(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let user = self
            .lookup
            .get_by_email(email)
            .await?
            .ok_or(AuthError::UnknownEmail)?;

        let password = password.to_string();
        let hash = user.password_hash.clone();
        let matched =
            tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??;

        if !matched {
            return Err(AuthError::WrongPassword);
        }
        Ok(Identity::from(&user))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let identity = self.authenticate(email, password).await?;
        Ok(self.tokens.issue(&identity)?)
    }

    /// 从有效令牌中取出身份，不访问存储
    pub fn identify(&self, token: &str) -> Result<Identity, TokenError> {
        self.tokens.verify(token).map(Identity::from)
    }

    pub fn refresh(&self, token: &str) -> Result<IssuedToken, TokenError> {
        let issued = self.tokens.refresh(token);
        if let Err(e) = &issued {
            tracing::debug!(parent: &self.span, reason = %e, "refresh rejected");
        }
        issued
    }
}
