use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{Instrument, Span};

use super::with_deadline;
use crate::cache::CacheLayer;
use crate::cache::keys::{user_email_key, user_id_key};
use crate::config::Config;
use crate::database::{User, UserStore};
use crate::error::{CacheError, StoreError};

/// 查询用户的键
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    Id(u64),
    Email(String),
}

impl LookupKey {
    pub fn cache_key(&self) -> String {
        match self {
            LookupKey::Id(id) => user_id_key(*id),
            LookupKey::Email(email) => user_email_key(email),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LookupSettings {
    pub ttl_by_id: Duration,
    pub ttl_by_email: Duration,
    pub cache_timeout: Duration,
    pub store_timeout: Duration,
}

impl LookupSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ttl_by_id: config.cache.ttl_by_id(),
            ttl_by_email: config.cache.ttl_by_email(),
            cache_timeout: config.cache.timeout(),
            store_timeout: config.store_timeout(),
        }
    }

    fn ttl_for(&self, key: &LookupKey) -> Duration {
        match key {
            LookupKey::Id(_) => self.ttl_by_id,
            LookupKey::Email(_) => self.ttl_by_email,
        }
    }
}

/// 按 ID 或邮箱解析用户
///
/// `Ok(None)` 表示用户不存在，`Err` 只表示存储故障。
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn get(&self, key: &LookupKey) -> Result<Option<User>, StoreError>;

    async fn get_by_id(&self, id: u64) -> Result<Option<User>, StoreError> {
        self.get(&LookupKey::Id(id)).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.get(&LookupKey::Email(email.to_string())).await
    }

    /// 丢弃该用户在所有命名空间下的快照
    async fn invalidate(&self, _user: &User) {}
}

/// 缓存旁路查询：先读缓存，未命中再查存储并尽力回填
///
/// 同一个键的并发查询可能同时未命中、同时查库、同时回填，最后写入的
/// 快照生效。快照内容相同，所以不做去重。两个命名空间各自过期，
/// 彼此之间不保证一致。
pub struct CachedUserLookup {
    store: Arc<dyn UserStore>,
    cache: Arc<dyn CacheLayer>,
    settings: LookupSettings,
    span: Span,
}

impl CachedUserLookup {
    pub fn new(
        store: Arc<dyn UserStore>,
        cache: Arc<dyn CacheLayer>,
        settings: LookupSettings,
        span: Span,
    ) -> Self {
        Self {
            store,
            cache,
            settings,
            span,
        }
    }

    /// 未命中、反序列化失败、缓存出错和超时都当作未命中
    async fn read_cache(&self, key: &str) -> Option<User> {
        let result = with_deadline(self.settings.cache_timeout, self.cache.get(key), || {
            CacheError::Timeout
        })
        .await;

        match result {
            Ok(Some(bytes)) => match serde_json::from_slice::<User>(&bytes) {
                Ok(user) => {
                    tracing::debug!(key, "User found in cache");
                    Some(user)
                }
                Err(e) => {
                    tracing::warn!(key, error = %e, "Failed to deserialize cached user");
                    None
                }
            },
            Ok(None) => {
                tracing::debug!(key, "Cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed, falling back to store");
                None
            }
        }
    }

    /// 回填失败只记录日志
    async fn write_cache(&self, key: &str, user: &User, ttl: Duration) {
        let bytes = match serde_json::to_vec(user) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize user for caching");
                return;
            }
        };

        let result = with_deadline(
            self.settings.cache_timeout,
            self.cache.set(key, bytes, ttl),
            || CacheError::Timeout,
        )
        .await;

        match result {
            Ok(()) => tracing::debug!(key, ttl_secs = ttl.as_secs(), "Stored user in cache"),
            Err(e) => tracing::warn!(key, error = %e, "Failed to cache user"),
        }
    }

    async fn resolve(&self, key: &LookupKey) -> Result<Option<User>, StoreError> {
        let cache_key = key.cache_key();

        if let Some(user) = self.read_cache(&cache_key).await {
            return Ok(Some(user));
        }

        let limit = self.settings.store_timeout;
        let fetched = match key {
            LookupKey::Id(id) => {
                with_deadline(limit, self.store.find_by_id(*id), || StoreError::Timeout).await
            }
            LookupKey::Email(email) => {
                with_deadline(limit, self.store.find_by_email(email), || {
                    StoreError::Timeout
                })
                .await
            }
        };

        let user = match fetched {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::debug!(key = %cache_key, "User not found in store");
                return Ok(None);
            }
            Err(e) => {
                tracing::error!(key = %cache_key, error = %e, "Failed to get user from store");
                return Err(e);
            }
        };

        self.write_cache(&cache_key, &user, self.settings.ttl_for(key))
            .await;
        Ok(Some(user))
    }
}

#[async_trait]
impl UserLookup for CachedUserLookup {
    async fn get(&self, key: &LookupKey) -> Result<Option<User>, StoreError> {
        self.resolve(key).instrument(self.span.clone()).await
    }

    async fn invalidate(&self, user: &User) {
        let keys = [user_id_key(user.id), user_email_key(&user.email)];
        for key in &keys {
            let result = with_deadline(
                self.settings.cache_timeout,
                self.cache.delete(key),
                || CacheError::Timeout,
            )
            .instrument(self.span.clone())
            .await;

            if let Err(e) = result {
                tracing::warn!(parent: &self.span, key = %key, error = %e, "Failed to invalidate cached user");
            }
        }
    }
}
