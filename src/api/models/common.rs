// 通用的数据结构定义

use axum::Json;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// 通用的API响应结构，`status` 始终与 HTTP 状态码一致
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// 只在失败时出现
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<serde_json::Value>>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(status: StatusCode, message: &str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            status: status.as_u16(),
            message: Some(message.to_string()),
            data: Some(data),
            errors: None,
        })
    }

    pub fn error(status: StatusCode, message: &str, errors: Vec<serde_json::Value>) -> Json<Self> {
        Json(Self {
            success: false,
            status: status.as_u16(),
            message: Some(message.to_string()),
            data: None,
            errors: Some(errors),
        })
    }
}
