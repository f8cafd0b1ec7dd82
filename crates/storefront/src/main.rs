//! BuildMart storefront - customer-facing JSON API.
//!
//! This binary serves the storefront API on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON responses in an `ActionResult` envelope
//! - `PostgreSQL` for catalog, orders, chat, and sessions (`shop` schema)
//! - `LISTEN/NOTIFY` fan-out so chat and catalog events reach both binaries
//! - SMTP for transactional email, sent in the background
//!
//! Migrations are NOT run on startup. Run them with `bm-cli migrate`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;

use buildmart_shop::db::create_pool;
use buildmart_shop::email::Mailer;
use buildmart_shop::events::EventHub;
use buildmart_shop::telemetry::{init_sentry, init_tracing};
use buildmart_storefront::cache::spawn_invalidation;
use buildmart_storefront::config::StorefrontConfig;
use buildmart_storefront::middleware::{create_session_layer, create_session_store};
use buildmart_storefront::state::AppState;

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config.sentry, sentry::release_name!());

    init_tracing("buildmart_storefront=info,buildmart_shop=info,tower_http=debug");

    let pool = create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    let events = EventHub::new();
    let _listener = events.spawn_listener(pool.clone());

    let mailer = Mailer::new(config.email.as_ref(), &config.base_url)
        .expect("Failed to configure mailer");

    let state = AppState::new(config.clone(), pool, events, mailer);
    let _invalidation = spawn_invalidation(state.cache().clone(), state.events());

    let session_layer =
        create_session_layer(create_session_store(state.pool()), state.config());

    let app = buildmart_storefront::app(state, session_layer)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
