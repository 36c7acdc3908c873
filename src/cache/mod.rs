// 缓存模块
// 查询服务前面的读缓存，值对缓存层来说是不透明的字节

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

pub mod keys;
pub mod redis_cache;

pub use redis_cache::RedisCache;

/// 带过期时间的键值缓存
///
/// 不存在或已过期的键返回 `Ok(None)`，不是错误。`set` / `delete` 的失败
/// 由调用方决定是否忽略。
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
