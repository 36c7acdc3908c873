// 数据库模块
// 包含数据库实体定义和存储库操作

pub mod models;
pub mod repositories;

pub use models::user::{NewUser, User};
pub use repositories::user::{PgUserStore, UserStore};
