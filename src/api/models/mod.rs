// API 数据传输对象模块

pub mod common;
pub mod user;

pub use common::ApiResponse;
pub use user::{CreateUserRequest, LoginRequest, TokenResponse, UserResponse};
