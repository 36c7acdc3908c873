use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::models::common::ApiResponse;
use crate::utils::FieldError;

/// 存储层错误，始终向上传递到处理器
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    Conflict,
    #[error("store operation timed out")]
    Timeout,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// 缓存层错误，只在查询服务内部记录，不会传给调用方
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
    #[error("cache operation timed out")]
    Timeout,
    #[error("cache unavailable")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("unauthorized: {reason}")]
    Unauthorized { realm: String, reason: &'static str },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, errors): (&str, Vec<serde_json::Value>) = match &self {
            AppError::Validation(fields) => (
                "Bad Request",
                fields
                    .iter()
                    .filter_map(|f| serde_json::to_value(f).ok())
                    .collect(),
            ),
            AppError::BadRequest(detail) => (detail.as_str(), vec![detail.as_str().into()]),
            AppError::NotFound(what) => (*what, vec![(*what).into()]),
            AppError::Unauthorized { reason, .. } => ("Unauthorized", vec![(*reason).into()]),
            AppError::Store(StoreError::Conflict) => {
                ("Conflict", vec!["email already registered".into()])
            }
            // 不把数据库细节暴露给客户端
            AppError::Store(_) | AppError::Internal(_) => (
                "Internal Server Error",
                vec!["internal server error".into()],
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut response = (status, ApiResponse::<()>::error(status, message, errors)).into_response();
        if let AppError::Unauthorized { realm, .. } = &self {
            if let Ok(value) = HeaderValue::from_str(&format!("JWT realm=\"{realm}\"")) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}
