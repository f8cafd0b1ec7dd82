//! BuildMart storefront library.
//!
//! The customer-facing JSON API: catalog browsing, session cart, wishlist,
//! checkout, order history, reviews, and support chat. The binary in
//! `main.rs` adds Sentry and the `PostgreSQL` session store around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
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
    middleware::from_fn,
    routing::get,
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::Span;

use state::AppState;

/// Build the storefront router with every layer except Sentry.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    let trust_proxy_headers = state.config().trust_proxy_headers;
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", routes::routes(trust_proxy_headers))
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
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
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::net::SocketAddr;

    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Method, header};
    use buildmart_core::{Email, UserId, UserRole};
    use buildmart_shop::email::Mailer;
    use buildmart_shop::events::EventHub;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, Session};

    use crate::config::StorefrontConfig;
    use crate::middleware::set_current_user;
    use crate::models::CurrentUser;

    const PEER: ([u8; 4], u16) = ([203, 0, 113, 7], 40_000);

    /// Test-only route that signs the request in as customer 1.
    async fn sign_in(session: Session) {
        let user = CurrentUser {
            id: UserId::new(1),
            email: Email::parse("pat@example.com").unwrap(),
            name: "Pat Builder".to_string(),
            role: UserRole::Customer,
        };
        set_current_user(&session, &user).await.unwrap();
    }

    /// The app with an in-memory session store, a pool that never connects,
    /// and a `/test/sign-in` helper route. Only requests that fail before
    /// touching the database may be sent.
    fn test_app_with(config: StorefrontConfig) -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://buildmart@localhost/buildmart_test")
            .unwrap();
        let mailer = Mailer::disabled(&config.base_url);
        let state = AppState::new(config, pool, EventHub::new(), mailer);

        let session_layer = SessionManagerLayer::new(MemoryStore::default());
        let sign_in = Router::new()
            .route("/test/sign-in", axum::routing::post(sign_in))
            .layer(session_layer.clone());
        app(state, session_layer).merge(sign_in)
    }

    fn test_app() -> Router {
        test_app_with(StorefrontConfig::for_tests())
    }

    async fn session_cookie(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(request(Method::POST, "/test/sign-in", None))
            .await
            .unwrap();
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        cookie.split(';').next().unwrap().to_string()
    }

    /// A request from a directly connected client at [`PEER`].
    fn request(method: Method, uri: &str, body: Option<&str>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .extension(ConnectInfo(SocketAddr::from(PEER)));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_owned()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // =========================================================================
    // Health and layers
    // =========================================================================

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(request(Method::GET, "/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["x-frame-options"], "DENY");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = test_app()
            .oneshot(request(Method::GET, "/api/nope", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // =========================================================================
    // Auth
    // =========================================================================

    #[tokio::test]
    async fn test_account_requires_sign_in() {
        let response = test_app()
            .oneshot(request(Method::GET, "/api/account", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Please sign in");
    }

    #[tokio::test]
    async fn test_chat_requires_sign_in() {
        let response = test_app()
            .oneshot(request(Method::GET, "/api/chat/events", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_chat_events_stream_for_signed_in_customer() {
        let app = test_app();
        let cookie = session_cookie(&app).await;

        let mut req = request(Method::GET, "/api/chat/events", None);
        req.headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let response = test_app()
            .oneshot(request(
                Method::POST,
                "/api/auth/register",
                Some(r#"{"email":"pat@example.com","password":"short","name":"Pat"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_malformed_json_uses_envelope() {
        let response = test_app()
            .oneshot(request(Method::POST, "/api/auth/login", Some("{not json")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    #[tokio::test]
    async fn test_inverted_price_range_is_rejected() {
        let response = test_app()
            .oneshot(request(
                Method::GET,
                "/api/products?min_price=100&max_price=10",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // =========================================================================
    // Cart and checkout
    // =========================================================================

    #[tokio::test]
    async fn test_new_session_has_empty_cart() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/cart", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["item_count"], 0);
        assert_eq!(body["data"]["items"], serde_json::json!([]));

        let response = app
            .oneshot(request(Method::GET, "/api/cart/count", None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["data"]["count"], 0);
    }

    #[tokio::test]
    async fn test_updating_missing_cart_line_is_404() {
        let response = test_app()
            .oneshot(request(
                Method::PATCH,
                "/api/cart/items/5",
                Some(r#"{"quantity":2}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_adding_zero_units_is_rejected() {
        let response = test_app()
            .oneshot(request(
                Method::POST,
                "/api/cart/items",
                Some(r#"{"product_id":5,"quantity":0}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_checkout_with_empty_cart() {
        let contact = r#"{
            "customer_name": "Pat Builder",
            "customer_email": "pat@example.com",
            "delivery_method": "pickup"
        }"#;
        let response = test_app()
            .oneshot(request(Method::POST, "/api/checkout", Some(contact)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Your cart is empty");
    }

    // =========================================================================
    // Rate limits
    // =========================================================================

    /// Send ten malformed logins from the same peer, each claiming a
    /// different address in `X-Forwarded-For`. Returns how many were limited.
    async fn limited_logins(app: &Router) -> usize {
        let mut limited = 0;
        for i in 0..10_u8 {
            let mut req = request(Method::POST, "/api/auth/login", Some("{not json"));
            req.headers_mut().insert(
                "x-forwarded-for",
                format!("198.51.100.{i}").parse().unwrap(),
            );
            let response = app.clone().oneshot(req).await.unwrap();
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                limited += 1;
            }
        }
        limited
    }

    #[tokio::test]
    async fn test_forwarded_for_cannot_dodge_login_limit() {
        let app = test_app();
        assert!(limited_logins(&app).await >= 4);
    }

    #[tokio::test]
    async fn test_trusted_proxy_limits_per_forwarded_client() {
        let mut config = StorefrontConfig::for_tests();
        config.trust_proxy_headers = true;
        let app = test_app_with(config);
        assert_eq!(limited_logins(&app).await, 0);
    }
}
