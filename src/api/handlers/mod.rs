// API 处理器模块

pub mod auth;
pub mod health;
pub mod user;

pub use auth::{login, refresh_token};
pub use health::ping;
pub use user::{create_user, get_me, get_user};
