//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use buildmart_shop::email::Mailer;
use buildmart_shop::events::EventHub;

use crate::config::AdminConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    events: EventHub,
    mailer: Mailer,
}

impl AppState {
    #[must_use]
    pub fn new(config: AdminConfig, pool: PgPool, events: EventHub, mailer: Mailer) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                events,
                mailer,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.inner.events
    }

    /// Mailer whose links point at the storefront.
    #[must_use]
    pub fn mailer(&self) -> &Mailer {
        &self.inner.mailer
    }
}
