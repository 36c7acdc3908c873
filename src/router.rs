use axum::{
    Router,
    http::{Request, Response},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::{
    AppState,
    api::handlers,
    middleware::{auth_middleware, log_errors},
};

// 不需要令牌的路由
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::create_user))
        .route("/users/", post(handlers::create_user))
        .route("/auth/login", post(handlers::login))
        // 过期令牌也要能刷新，所以不走认证中间件
        .route("/auth/refresh", get(handlers::refresh_token))
        .route("/ping", get(handlers::ping))
}

// 需要有效令牌的路由
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/me", get(handlers::get_me))
        .route("/users/{id}", get(handlers::get_user))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

// 创建主路由
pub fn create_router(state: AppState) -> Router {
    let api = public_routes().merge(protected_routes(state.clone()));

    Router::new()
        .nest("/api", api)
        .layer(from_fn(log_errors))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    let request_id = uuid::Uuid::new_v4();
                    tracing::info_span!(
                        "http_request",
                        %request_id,
                        method = %req.method(),
                        uri = %req.uri(),
                        status = tracing::field::Empty,
                    )
                })
                .on_response(|res: &Response<_>, latency: Duration, span: &Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    if status.is_server_error() {
                        tracing::error!(%status, latency_ms = latency.as_millis() as u64, "response");
                    } else {
                        tracing::info!(%status, latency_ms = latency.as_millis() as u64, "response");
                    }
                }),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::ApiResponse;
    use crate::config::test_config;
    use crate::services::Identity;
    use crate::testing::{MemoryCache, MemoryStore};
    use axum::body::{Body, to_bytes};
    use axum::http::{StatusCode, header};
    use chrono::{TimeDelta, Utc};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        state: AppState,
        store: Arc<MemoryStore>,
        cache: Arc<MemoryCache>,
    }

    fn app() -> TestApp {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(MemoryCache::default());
        let state = AppState::new(test_config(), store.clone(), cache.clone());
        TestApp {
            router: create_router(state.clone()),
            state,
            store,
            cache,
        }
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, ApiResponse<Value>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: ApiResponse<Value> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope.status, status.as_u16());
        assert_eq!(envelope.success, status.is_success());
        assert_eq!(envelope.errors.is_some(), !status.is_success());
        (status, headers, envelope)
    }

    async fn create(app: &TestApp, name: &str, email: &str, password: &str) -> Value {
        let (status, _, body) = send(
            &app.router,
            "POST",
            "/api/users/",
            None,
            Some(json!({"name": name, "email": email, "password": password})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body.data.unwrap()
    }

    async fn login(app: &TestApp, email: &str, password: &str) -> (StatusCode, ApiResponse<Value>) {
        let (status, _, body) = send(
            &app.router,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": email, "password": password})),
        )
        .await;
        (status, body)
    }

    async fn token_for(app: &TestApp, email: &str, password: &str) -> String {
        let (status, body) = login(app, email, password).await;
        assert_eq!(status, StatusCode::OK);
        body.data.unwrap()["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn create_returns_public_fields_only() {
        let app = app();
        let user = create(&app, "Ann", "a@b.com", "secret1").await;

        assert_eq!(user["name"], "Ann");
        assert_eq!(user["email"], "a@b.com");
        assert!(user["id"].as_u64().is_some());
        assert!(user["created_at"].is_string());
        assert!(user.get("password").is_none());
        assert!(user.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn create_without_trailing_slash_is_routed() {
        let app = app();
        let (status, _, _) = send(
            &app.router,
            "POST",
            "/api/users",
            None,
            Some(json!({"name": "Ann", "email": "a@b.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn create_with_short_password_reports_field_error() {
        let app = app();
        let (status, _, body) = send(
            &app.router,
            "POST",
            "/api/users/",
            None,
            Some(json!({"name": "Ann", "email": "a@b.com", "password": "12345"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let errors = body.errors.unwrap();
        assert_eq!(errors[0], json!({"field": "password", "tag": "min", "value": "6"}));
        assert_eq!(app.store.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn create_with_malformed_json_is_bad_request() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/users/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{oops"))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let app = app();
        create(&app, "Ann", "a@b.com", "secret1").await;
        let (status, _, _) = send(
            &app.router,
            "POST",
            "/api/users/",
            None,
            Some(json!({"name": "Ann", "email": "a@b.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn store_outage_on_create_is_500() {
        let app = app();
        app.store.failing.store(true, Ordering::SeqCst);
        let (status, _, body) = send(
            &app.router,
            "POST",
            "/api/users/",
            None,
            Some(json!({"name": "Ann", "email": "a@b.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.errors.unwrap()[0], "internal server error");
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let app = app();
        create(&app, "Ann", "a@b.com", "secret1").await;

        let (wrong_status, wrong) = login(&app, "a@b.com", "wrong").await;
        let (unknown_status, unknown) = login(&app, "nouser@b.com", "secret1").await;

        assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            serde_json::to_value(&wrong).unwrap(),
            serde_json::to_value(&unknown).unwrap()
        );
        assert_eq!(wrong.message.as_deref(), Some("Unauthorized"));
    }

    #[tokio::test]
    async fn login_with_store_down_is_the_same_401() {
        let app = app();
        create(&app, "Ann", "a@b.com", "secret1").await;
        let (_, wrong) = login(&app, "a@b.com", "wrong").await;

        app.store.failing.store(true, Ordering::SeqCst);
        app.cache.failing.store(true, Ordering::SeqCst);
        let (status, outage) = login(&app, "a@b.com", "secret1").await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            serde_json::to_value(&outage).unwrap(),
            serde_json::to_value(&wrong).unwrap()
        );
    }

    #[tokio::test]
    async fn get_by_id_requires_token() {
        let app = app();
        let user = create(&app, "Ann", "a@b.com", "secret1").await;
        let uri = format!("/api/users/{}", user["id"]);

        let (status, headers, _) = send(&app.router, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            headers.get(header::WWW_AUTHENTICATE).unwrap(),
            "JWT realm=\"test\""
        );

        let token = token_for(&app, "a@b.com", "secret1").await;
        let (status, _, body) = send(&app.router, "GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.data.unwrap()["id"], user["id"]);
    }

    #[tokio::test]
    async fn token_in_query_is_accepted() {
        let app = app();
        create(&app, "Ann", "a@b.com", "secret1").await;
        let token = token_for(&app, "a@b.com", "secret1").await;

        let uri = format!("/api/users/me?token={token}");
        let (status, _, _) = send(&app.router, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn get_by_id_status_codes() {
        let app = app();
        create(&app, "Ann", "a@b.com", "secret1").await;
        let token = token_for(&app, "a@b.com", "secret1").await;

        let (status, _, _) = send(&app.router, "GET", "/api/users/abc", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) =
            send(&app.router, "GET", "/api/users/999", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.message.as_deref(), Some("User not found"));
    }

    #[tokio::test]
    async fn get_by_id_survives_cache_outage() {
        let app = app();
        let user = create(&app, "Ann", "a@b.com", "secret1").await;
        let token = token_for(&app, "a@b.com", "secret1").await;
        app.cache.failing.store(true, Ordering::SeqCst);

        let uri = format!("/api/users/{}", user["id"]);
        let (status, _, body) = send(&app.router, "GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.data.unwrap()["name"], "Ann");
    }

    #[tokio::test]
    async fn me_resolves_identity_from_token() {
        let app = app();
        let user = create(&app, "Ann", "a@b.com", "secret1").await;
        let token = token_for(&app, "a@b.com", "secret1").await;

        let (status, _, body) = send(&app.router, "GET", "/api/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let data = body.data.unwrap();
        assert_eq!(data["id"], user["id"]);
        assert_eq!(data["email"], "a@b.com");
    }

    #[tokio::test]
    async fn me_rejects_garbage_token() {
        let app = app();
        let (status, _, body) =
            send(&app.router, "GET", "/api/users/me", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.errors.unwrap()[0], "invalid token");
    }

    #[tokio::test]
    async fn expired_token_is_rejected_but_refreshable() {
        let app = app();
        let user = create(&app, "Ann", "a@b.com", "secret1").await;
        let identity = Identity {
            id: user["id"].as_u64().unwrap(),
            email: "a@b.com".into(),
        };
        let issued_at = Utc::now() - TimeDelta::hours(30);
        let stale = app
            .state
            .auth
            .tokens()
            .issue_at(&identity, issued_at)
            .unwrap()
            .token;

        let (status, _, body) = send(&app.router, "GET", "/api/users/me", Some(&stale), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.errors.unwrap()[0], "token is expired");

        let (status, _, body) =
            send(&app.router, "GET", "/api/auth/refresh", Some(&stale), None).await;
        assert_eq!(status, StatusCode::OK);
        let fresh = body.data.unwrap()["token"].as_str().unwrap().to_string();

        let (status, _, _) = send(&app.router, "GET", "/api/users/me", Some(&fresh), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn token_past_refresh_window_cannot_refresh() {
        let app = app();
        let identity = Identity {
            id: 1,
            email: "a@b.com".into(),
        };
        let issued_at = Utc::now() - TimeDelta::hours(24 + 72 + 1);
        let dead = app
            .state
            .auth
            .tokens()
            .issue_at(&identity, issued_at)
            .unwrap()
            .token;

        let (status, _, _) = send(&app.router, "GET", "/api/auth/refresh", Some(&dead), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_without_token_is_401() {
        let app = app();
        let (status, _, _) = send(&app.router, "GET", "/api/auth/refresh", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ping_is_public() {
        let app = app();
        let (status, _, body) = send(&app.router, "GET", "/api/ping", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.data.unwrap()["status"], "ok");
    }
}
