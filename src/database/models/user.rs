use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 用户数据库实体，同时作为缓存快照序列化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    #[sqlx(try_from = "i64")]
    pub id: u64,
    pub name: String,
    pub email: String,
    /// bcrypt 哈希，写入后从不保存明文
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 待写入的新用户，密码已经是哈希
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}
