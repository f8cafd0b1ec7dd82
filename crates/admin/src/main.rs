//! BuildMart admin - internal staff API.
//!
//! This binary serves the admin API on port 3001. It shares the `shop`
//! schema with the storefront; catalog and chat changes reach the
//! storefront through `LISTEN/NOTIFY`.
//!
//! Migrations are NOT run on startup. Run them with `bm-cli migrate`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use buildmart_admin::config::AdminConfig;
use buildmart_admin::middleware::{create_session_layer, create_session_store};
use buildmart_admin::state::AppState;
use buildmart_shop::db::create_pool;
use buildmart_shop::email::Mailer;
use buildmart_shop::events::EventHub;
use buildmart_shop::telemetry::{init_sentry, init_tracing};

#[tokio::main]
async fn main() {
    let config = AdminConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config.sentry, sentry::release_name!());

    init_tracing("buildmart_admin=info,buildmart_shop=info,tower_http=debug");

    let pool = create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    let events = EventHub::new();
    let _listener = events.spawn_listener(pool.clone());

    let mailer = Mailer::new(config.email.as_ref(), &config.storefront_url)
        .expect("Failed to configure mailer");

    let state = AppState::new(config.clone(), pool, events, mailer);
    let session_layer =
        create_session_layer(create_session_store(state.pool()), state.config());

    let app = buildmart_admin::app(state, session_layer)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("admin listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
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
