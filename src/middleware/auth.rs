use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Request, Uri},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde::Deserialize;

use crate::{AppState, error::AppError, services::TokenError};

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// 先查 `Authorization: Bearer`，再查 `?token=`
pub fn extract_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }

    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

pub fn token_rejection(realm: &str, err: &TokenError) -> AppError {
    let reason = match err {
        TokenError::Expired => "token is expired",
        _ => "invalid token",
    };
    AppError::Unauthorized {
        realm: realm.to_string(),
        reason,
    }
}

/// 校验令牌，把 `Identity` 放进请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let realm = state.auth.tokens().realm();

    let token = extract_token(request.headers(), request.uri()).ok_or_else(|| {
        AppError::Unauthorized {
            realm: realm.to_string(),
            reason: "missing bearer token",
        }
    })?;

    let identity = state.auth.identify(&token).map_err(|e| {
        tracing::debug!(reason = %e, "bearer token rejected");
        token_rejection(realm, &e)
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
