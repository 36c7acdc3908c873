// 业务服务模块
// 缓存旁路查询、认证与令牌、用户创建

use std::future::Future;
use std::time::Duration;

pub mod auth;
pub mod lookup;
pub mod token;
pub mod user;

pub use auth::{AuthError, AuthService};
pub use lookup::{CachedUserLookup, LookupKey, LookupSettings, UserLookup};
pub use token::{Claims, Identity, IssuedToken, TokenError, TokenService};
pub use user::{CreateOutcome, UserError, UserService};

/// 所有缓存和存储调用都必须有期限，超时按 `elapsed` 给出的错误处理
pub(crate) async fn with_deadline<T, E, F>(
    limit: Duration,
    fut: F,
    elapsed: impl FnOnce() -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(elapsed()),
    }
}
