use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, Uri},
};

use crate::{
    AppState,
    api::models::{ApiResponse, LoginRequest, TokenResponse},
    error::AppError,
    middleware::{extract_token, token_rejection},
    services::AuthError,
};

type TokenReply = (StatusCode, Json<ApiResponse<TokenResponse>>);

/// 登录，所有失败原因对外都是同一个 401
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<TokenReply, AppError> {
    let realm = state.auth.tokens().realm().to_string();

    let Json(req) = payload.map_err(|e| {
        tracing::debug!(error = %e, "invalid login payload");
        AppError::Unauthorized {
            realm: realm.clone(),
            reason: "missing email or password",
        }
    })?;

    match state.auth.login(&req.email, &req.password).await {
        Ok(issued) => Ok((
            StatusCode::OK,
            ApiResponse::success(StatusCode::OK, "Login successful", TokenResponse::from(issued)),
        )),
        Err(e) if e.is_rejection() => Err(AppError::Unauthorized {
            realm,
            reason: AuthError::PUBLIC_MESSAGE,
        }),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}

/// 用未过期或仍在刷新窗口内的令牌换新令牌
#[axum::debug_handler]
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<TokenReply, AppError> {
    let realm = state.auth.tokens().realm();

    let token = extract_token(&headers, &uri).ok_or_else(|| AppError::Unauthorized {
        realm: realm.to_string(),
        reason: "missing bearer token",
    })?;

    let issued = state
        .auth
        .refresh(&token)
        .map_err(|e| token_rejection(realm, &e))?;

    Ok((
        StatusCode::OK,
        ApiResponse::success(
            StatusCode::OK,
            "Token refreshed successfully",
            TokenResponse::from(issued),
        ),
    ))
}
