use axum::{
    Json,
    extract::{Extension, Path, State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{ApiResponse, CreateUserRequest, UserResponse},
    error::AppError,
    services::{CreateOutcome, Identity},
};

type UserReply = (StatusCode, Json<ApiResponse<UserResponse>>);

/// 创建用户
#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<UserReply, AppError> {
    let Json(req) = payload.map_err(|e| {
        tracing::debug!(error = %e, "invalid create payload");
        AppError::BadRequest("Invalid request payload".to_string())
    })?;

    match state.users.create(req).await? {
        CreateOutcome::Created(user) => Ok((
            StatusCode::CREATED,
            ApiResponse::success(
                StatusCode::CREATED,
                "User created successfully",
                UserResponse::from(&user),
            ),
        )),
        CreateOutcome::Invalid(errors) => Err(AppError::Validation(errors)),
    }
}

/// 按 ID 获取用户
#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<UserReply, AppError> {
    let id: u64 = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid ID".to_string()))?;

    let user = state
        .users
        .get(id)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    Ok((
        StatusCode::OK,
        ApiResponse::success(
            StatusCode::OK,
            "User retrieved successfully",
            UserResponse::from(&user),
        ),
    ))
}

/// 获取当前登录用户
#[axum::debug_handler]
pub async fn get_me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<UserReply, AppError> {
    let user = state
        .users
        .get(identity.id)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    Ok((
        StatusCode::OK,
        ApiResponse::success(
            StatusCode::OK,
            "User retrieved successfully",
            UserResponse::from(&user),
        ),
    ))
}
