//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `DELIVERY_FLAT_FEE` - Delivery fee (default: 25.00)
//! - `DELIVERY_FREE_OVER` - Free delivery threshold, `none` disables (default: 500.00)
//! - `REVIEWS_AUTO_APPROVE` - Publish new reviews immediately (default: true)
//! - `CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime (default: 60)
//! - `TRUST_PROXY_HEADERS` - Rate-limit on `X-Forwarded-For` and friends
//!   instead of the peer address. Only set behind a proxy that overwrites
//!   them (default: false)
//! - SMTP and Sentry blocks, see [`buildmart_shop::config`]

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;

use buildmart_core::DeliveryPolicy;
use buildmart_shop::config::{
    ConfigError, SentryConfig, get_base_url, get_database_url, get_delivery_policy,
    get_session_secret, load_dotenv, parse_env_or,
};
use buildmart_shop::email::EmailConfig;

const DEFAULT_CACHE_TTL_SECS: u64 = 60;
const MAX_CACHE_TTL_SECS: u64 = 3_600;

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` connection URL (contains credentials).
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public URL, used for cookie security and links in emails.
    pub base_url: String,
    /// Session secret (validated for length and entropy).
    pub session_secret: SecretString,
    pub delivery: DeliveryPolicy,
    pub reviews_auto_approve: bool,
    pub catalog_cache_ttl: Duration,
    /// Key rate limits on proxy headers rather than the peer address.
    pub trust_proxy_headers: bool,
    /// SMTP settings. `None` disables transactional email.
    pub email: Option<EmailConfig>,
    pub sentry: SentryConfig,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env_or("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = parse_env_or("STOREFRONT_PORT", 3000_u16)?;
        let base_url = get_base_url("STOREFRONT_BASE_URL")?;
        let session_secret = get_session_secret("STOREFRONT_SESSION_SECRET")?;

        let ttl_secs = parse_env_or("CATALOG_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?;
        if ttl_secs == 0 || ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::InvalidEnvVar(
                "CATALOG_CACHE_TTL_SECS".to_string(),
                format!("must be between 1 and {MAX_CACHE_TTL_SECS}"),
            ));
        }

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            delivery: get_delivery_policy()?,
            reviews_auto_approve: parse_env_or("REVIEWS_AUTO_APPROVE", true)?,
            catalog_cache_ttl: Duration::from_secs(ttl_secs),
            trust_proxy_headers: parse_env_or("TRUST_PROXY_HEADERS", false)?,
            email: EmailConfig::from_env()?,
            sentry: SentryConfig::from_env()?,
        })
    }

    /// Get the socket address to bind to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

#[cfg(test)]
impl StorefrontConfig {
    /// Local development settings without SMTP or Sentry.
    pub(crate) fn for_tests() -> Self {
        Self {
            database_url: SecretString::from("postgres://buildmart@localhost/buildmart_test"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("kX9#mP2$vL7@nQ4!wR8&jT3*hY6^bZ1%"),
            delivery: DeliveryPolicy::default(),
            reviews_auto_approve: true,
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            trust_proxy_headers: false,
            email: None,
            sentry: SentryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_secure_follows_base_url_scheme() {
        let mut config = StorefrontConfig::for_tests();
        assert!(!config.is_secure());
        config.base_url = "https://shop.buildmart.example".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig::for_tests();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
    }
}
