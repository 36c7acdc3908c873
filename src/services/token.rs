use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::database::User;

/// 令牌中携带的身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: u64,
    pub email: String,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: u64,
    pub email: String,
    pub iat: i64, // 签发时间
    pub exp: i64, // 过期时间
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    /// 已过期但还在刷新窗口内
    #[error("token is expired")]
    Expired,
    #[error("token is expired beyond the refresh window")]
    RefreshExpired,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl TokenError {
    pub fn refresh_eligible(&self) -> bool {
        matches!(self, TokenError::Expired)
    }
}

/// 签发、校验、刷新 HS256 令牌
///
/// 令牌在 `exp` 之前有效；`exp` 之后 `max_refresh` 之内可以换新令牌；
/// 再之后只能重新登录。
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    timeout: TimeDelta,
    max_refresh: TimeDelta,
    realm: String,
}

impl TokenService {
    pub fn new(cfg: &AuthConfig) -> Self {
        // 过期由下面自己判断，这样才能区分可刷新和不可刷新
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(cfg.secret_key.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret_key.as_bytes()),
            validation,
            timeout: TimeDelta::seconds(cfg.timeout().as_secs() as i64),
            max_refresh: TimeDelta::seconds(cfg.max_refresh().as_secs() as i64),
            realm: cfg.realm.clone(),
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    pub fn issue_at(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now + self.timeout;
        let claims = Claims {
            id: identity.id,
            email: identity.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;
        tracing::debug!(user_id = identity.id, "token signed");

        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        let now = now.timestamp();

        if now < claims.exp {
            Ok(claims)
        } else if now < self.refresh_deadline(&claims) {
            Err(TokenError::Expired)
        } else {
            Err(TokenError::RefreshExpired)
        }
    }

    pub fn refresh(&self, token: &str) -> Result<IssuedToken, TokenError> {
        self.refresh_at(token, Utc::now())
    }

    /// 未过期或在刷新窗口内的令牌都能换新
    pub fn refresh_at(&self, token: &str, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let claims = self.decode(token)?;
        if now.timestamp() >= self.refresh_deadline(&claims) {
            return Err(TokenError::RefreshExpired);
        }
        self.issue_at(&Identity::from(claims), now)
    }

    fn refresh_deadline(&self, claims: &Claims) -> i64 {
        claims.exp.saturating_add(self.max_refresh.num_seconds())
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                TokenError::Invalid
            })
    }
}
