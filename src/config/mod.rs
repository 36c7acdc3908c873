use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// 令牌有效期和刷新窗口的上限（十年）
const MAX_TOKEN_HOURS: u64 = 24 * 365 * 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// 数据库连接配置
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

/// Redis 连接配置
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

/// 令牌配置
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret_key: String,
    pub realm: String,
    pub timeout_hours: u64,
    pub max_refresh_hours: u64,
    pub bcrypt_cost: u32,
}

impl AuthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_hours * 3600)
    }

    pub fn max_refresh(&self) -> Duration {
        Duration::from_secs(self.max_refresh_hours * 3600)
    }
}

/// 缓存配置
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl_id_secs: u64,
    pub ttl_email_secs: u64,
    pub timeout_ms: u64,
}

impl CacheConfig {
    pub fn ttl_by_id(&self) -> Duration {
        Duration::from_secs(self.ttl_id_secs)
    }

    pub fn ttl_by_email(&self) -> Duration {
        Duration::from_secs(self.ttl_email_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    pub store_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let secret_key = env::var("AUTH_SECRET_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("AUTH_SECRET_KEY"))?;

        let config = Config {
            server_host: var_or("APP_HOST", "0.0.0.0"),
            server_port: parse_or("APP_PORT", 8080)?,
            database: DatabaseConfig {
                host: var_or("DB_HOST", "localhost"),
                port: parse_or("DB_PORT", 5432)?,
                user: var_or("DB_USER", "postgres"),
                password: var_or("DB_PASSWORD", "postgres"),
                name: var_or("DB_NAME", "postgres"),
                max_connections: parse_or("DB_MAX_CONNECTIONS", 10)?,
            },
            redis: RedisConfig {
                host: var_or("REDIS_HOST", "localhost"),
                port: parse_or("REDIS_PORT", 6379)?,
                password: var_or("REDIS_PASSWORD", ""),
                db: parse_or("REDIS_DB", 0)?,
            },
            auth: AuthConfig {
                secret_key,
                realm: var_or("AUTH_REALM", "api"),
                timeout_hours: parse_hours("AUTH_TIMEOUT_HOURS", 24)?,
                max_refresh_hours: parse_hours("AUTH_MAX_REFRESH_HOURS", 72)?,
                bcrypt_cost: parse_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            },
            cache: CacheConfig {
                ttl_id_secs: parse_or("CACHE_TTL_ID_SECS", 15 * 60)?,
                ttl_email_secs: parse_or("CACHE_TTL_EMAIL_SECS", 60 * 60)?,
                timeout_ms: parse_or("CACHE_TIMEOUT_MS", 200)?,
            },
            store_timeout_ms: parse_or("STORE_TIMEOUT_MS", 3000)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// 过期时间和刷新窗口都必须为正，保证 timeout < timeout + max_refresh
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("AUTH_TIMEOUT_HOURS", self.auth.timeout_hours),
            ("AUTH_MAX_REFRESH_HOURS", self.auth.max_refresh_hours),
            ("CACHE_TTL_ID_SECS", self.cache.ttl_id_secs),
            ("CACHE_TTL_EMAIL_SECS", self.cache.ttl_email_secs),
            ("CACHE_TIMEOUT_MS", self.cache.timeout_ms),
            ("STORE_TIMEOUT_MS", self.store_timeout_ms),
        ];
        for (var, value) in positive {
            if value == 0 {
                return Err(ConfigError::NotPositive(var));
            }
        }
        for (var, hours) in [
            ("AUTH_TIMEOUT_HOURS", self.auth.timeout_hours),
            ("AUTH_MAX_REFRESH_HOURS", self.auth.max_refresh_hours),
        ] {
            if hours > MAX_TOKEN_HOURS {
                return Err(ConfigError::Invalid {
                    var,
                    value: hours.to_string(),
                });
            }
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(ConfigError::Invalid {
                var: "BCRYPT_COST",
                value: self.auth.bcrypt_cost.to_string(),
            });
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn var_or(var: &'static str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

// 允许 "24h" 这种写法
fn parse_hours(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .trim_end_matches('h')
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        server_host: "127.0.0.1".into(),
        server_port: 0,
        database: DatabaseConfig {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: "postgres".into(),
            name: "postgres".into(),
            max_connections: 1,
        },
        redis: RedisConfig {
            host: "localhost".into(),
            port: 6379,
            password: String::new(),
            db: 0,
        },
        auth: AuthConfig {
            secret_key: "test-secret".into(),
            realm: "test".into(),
            timeout_hours: 24,
            max_refresh_hours: 72,
            bcrypt_cost: 4,
        },
        cache: CacheConfig {
            ttl_id_secs: 15 * 60,
            ttl_email_secs: 60 * 60,
            timeout_ms: 50,
        },
        store_timeout_ms: 200,
    }
}
