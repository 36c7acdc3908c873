use axum::{Json, http::StatusCode};
use serde::Serialize;

use crate::api::models::ApiResponse;

/// Ping响应
#[derive(Serialize)]
pub struct PingResponse {
    /// 服务状态
    pub status: String,
    /// 服务器时间
    pub timestamp: i64,
}

/// 健康检查接口
pub async fn ping() -> (StatusCode, Json<ApiResponse<PingResponse>>) {
    (
        StatusCode::OK,
        ApiResponse::success(
            StatusCode::OK,
            "pong",
            PingResponse {
                status: "ok".to_string(),
                timestamp: chrono::Utc::now().timestamp(),
            },
        ),
    )
}
