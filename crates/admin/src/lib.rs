//! BuildMart admin library.
//!
//! The internal staff API: catalog management, orders, review moderation,
//! customers, dashboard, and the staff side of support chat.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{Request, Response, StatusCode},
    routing::get,
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::Span;

use state::AppState;

/// Build the admin router with every layer except Sentry.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", routes::routes())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .layer(session_layer)
        .with_state(state)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Method, header};
    use buildmart_core::{Email, UserId, UserRole};
    use buildmart_shop::email::Mailer;
    use buildmart_shop::events::EventHub;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, Session};

    use crate::config::AdminConfig;
    use crate::middleware::set_current_staff;
    use crate::models::CurrentStaff;

    /// Test-only route that signs the request in with the given role.
    async fn sign_in_as(session: Session, axum::extract::Path(role): axum::extract::Path<String>) {
        let staff = CurrentStaff {
            id: UserId::new(1),
            email: Email::parse("staff@buildmart.example").unwrap(),
            name: "Sam Staff".to_string(),
            role: role.parse::<UserRole>().unwrap(),
        };
        set_current_staff(&session, &staff).await.unwrap();
    }

    /// The app with an in-memory session store and a pool that never
    /// connects, plus a `/test/sign-in/{role}` helper route.
    fn test_app() -> Router {
        let config = AdminConfig::for_tests();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://buildmart@localhost/buildmart_test")
            .unwrap();
        let mailer = Mailer::disabled(&config.storefront_url);
        let state = AppState::new(config, pool, EventHub::new(), mailer);

        let session_layer = SessionManagerLayer::new(MemoryStore::default());
        let sign_in = Router::new()
            .route("/test/sign-in/{role}", axum::routing::post(sign_in_as))
            .layer(session_layer.clone());
        app(state, session_layer).merge(sign_in)
    }

    async fn session_cookie(app: &Router, role: &str) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(format!("/test/sign-in/{role}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        cookie.split(';').next().unwrap().to_string()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app().oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dashboard_requires_sign_in() {
        let response = test_app()
            .oneshot(get("/api/dashboard", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_customer_session_is_forbidden() {
        let app = test_app();
        let cookie = session_cookie(&app, "customer").await;
        let response = app
            .oneshot(get("/api/dashboard", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_customers_require_admin_role() {
        let app = test_app();
        let cookie = session_cookie(&app, "staff").await;
        let response = app
            .oneshot(get("/api/customers", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_cannot_change_own_role() {
        let app = test_app();
        let cookie = session_cookie(&app, "admin").await;
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/customers/1/role")
                    .header(header::COOKIE, &cookie)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"role":"staff"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_presence_rejects_bad_ids() {
        let app = test_app();
        let cookie = session_cookie(&app, "staff").await;
        let response = app
            .oneshot(get("/api/chat/presence?user_ids=1,x", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_inverted_order_date_range_is_rejected() {
        let app = test_app();
        let cookie = session_cookie(&app, "staff").await;
        let response = app
            .oneshot(get(
                "/api/orders?from=2026-03-10&to=2026-03-01",
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
