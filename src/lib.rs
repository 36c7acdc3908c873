use std::sync::Arc;

use cache::CacheLayer;
use config::Config;
use database::UserStore;
use services::{AuthService, CachedUserLookup, LookupSettings, TokenService, UserLookup, UserService};

pub mod api;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod router;
pub mod services;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<UserService>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// 存储和缓存客户端在进程启动时创建一次，之后所有请求共享
    pub fn new(config: Config, store: Arc<dyn UserStore>, cache: Arc<dyn CacheLayer>) -> Self {
        let lookup: Arc<dyn UserLookup> = Arc::new(CachedUserLookup::new(
            store.clone(),
            cache,
            LookupSettings::from_config(&config),
            tracing::info_span!("user_lookup"),
        ));

        let users = UserService::new(
            store,
            lookup.clone(),
            config.auth.bcrypt_cost,
            config.store_timeout(),
            tracing::info_span!("user_service"),
        );
        let auth = AuthService::new(
            lookup,
            TokenService::new(&config.auth),
            tracing::info_span!("auth_service"),
        );

        Self {
            config: Arc::new(config),
            users: Arc::new(users),
            auth: Arc::new(auth),
        }
    }
}
