use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use sqlx::Executor;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use user_api::{
    AppState, cache::RedisCache, config::Config, database::PgUserStore, router::create_router,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // LOG_FORMAT=json 时输出结构化日志
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    // 初始化日志
    init_tracing();

    // 加载配置
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let db = &config.database;
    let connect_options = PgConnectOptions::new()
        .host(&db.host)
        .port(db.port)
        .username(&db.user)
        .password(&db.password)
        .database(&db.name);

    let pool = match PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(config.store_timeout())
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'user_api';").await?;
                Ok(())
            })
        })
        .connect_with(connect_options)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(host = %db.host, port = db.port, "Failed to connect to Postgres: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(host = %db.host, database = %db.name, "Connected to Postgres");

    // 设置 Redis 客户端
    let cache = match RedisCache::connect(&config.redis).await {
        Ok(cache) => cache,
        Err(e) => {
            tracing::error!("Failed to connect to Redis: {}", e);
            std::process::exit(1);
        }
    };

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );

    // 设置应用状态
    let state = AppState::new(config, Arc::new(PgUserStore::new(pool)), Arc::new(cache));
    let router = create_router(state);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 启动服务器
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, "Failed to bind: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Server listening on {}", addr);

    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
