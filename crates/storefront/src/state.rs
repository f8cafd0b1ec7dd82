//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use buildmart_shop::email::Mailer;
use buildmart_shop::events::EventHub;

use crate::cache::CatalogCache;
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    events: EventHub,
    mailer: Mailer,
    cache: CatalogCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The catalog cache is built from `config.catalog_cache_ttl`.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool, events: EventHub, mailer: Mailer) -> Self {
        let cache = CatalogCache::new(config.catalog_cache_ttl);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                events,
                mailer,
                cache,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Chat and catalog event fan-out.
    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.inner.events
    }

    #[must_use]
    pub fn mailer(&self) -> &Mailer {
        &self.inner.mailer
    }

    #[must_use]
    pub fn cache(&self) -> &CatalogCache {
        &self.inner.cache
    }
}
