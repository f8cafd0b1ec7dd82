//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ADMIN_BASE_URL` - Public URL for the admin API
//! - `ADMIN_SESSION_SECRET` - Session secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `LOW_STOCK_THRESHOLD` - Dashboard low-stock cutoff (default: 10)
//! - `STOREFRONT_BASE_URL` - Storefront URL for links in emails (default: <http://localhost:3000>)
//! - `DELIVERY_FLAT_FEE` / `DELIVERY_FREE_OVER` - Pricing for manual orders
//! - SMTP and Sentry blocks, see [`buildmart_shop::config`]

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;

use buildmart_core::DeliveryPolicy;
use buildmart_shop::config::{
    ConfigError, SentryConfig, get_base_url, get_base_url_or, get_database_url,
    get_delivery_policy, get_session_secret, load_dotenv, parse_env_or,
};
use buildmart_shop::email::EmailConfig;

const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 10;
const DEFAULT_STOREFRONT_URL: &str = "http://localhost:3000";

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    pub base_url: String,
    /// Session secret (validated for length and entropy)
    pub session_secret: SecretString,
    pub low_stock_threshold: i32,
    /// Customer-facing URL used in emails sent from the admin.
    pub storefront_url: String,
    pub delivery: DeliveryPolicy,
    pub email: Option<EmailConfig>,
    pub sentry: SentryConfig,
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();

        let low_stock_threshold =
            parse_env_or("LOW_STOCK_THRESHOLD", DEFAULT_LOW_STOCK_THRESHOLD)?;
        if low_stock_threshold < 0 {
            return Err(ConfigError::InvalidEnvVar(
                "LOW_STOCK_THRESHOLD".to_string(),
                "must not be negative".to_string(),
            ));
        }

        Ok(Self {
            database_url: get_database_url("ADMIN_DATABASE_URL")?,
            host: parse_env_or("ADMIN_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parse_env_or("ADMIN_PORT", 3001_u16)?,
            base_url: get_base_url("ADMIN_BASE_URL")?,
            session_secret: get_session_secret("ADMIN_SESSION_SECRET")?,
            low_stock_threshold,
            storefront_url: get_base_url_or("STOREFRONT_BASE_URL", DEFAULT_STOREFRONT_URL)?,
            delivery: get_delivery_policy()?,
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
impl AdminConfig {
    pub(crate) fn for_tests() -> Self {
        Self {
            database_url: SecretString::from("postgres://buildmart@localhost/buildmart_test"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3001,
            base_url: "http://localhost:3001".to_string(),
            session_secret: SecretString::from("Zq8!rT4@wE6#yU2$iO9%pA3^sD7&fG1*"),
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            storefront_url: DEFAULT_STOREFRONT_URL.to_string(),
            delivery: DeliveryPolicy::default(),
            email: None,
            sentry: SentryConfig::default(),
        }
    }
}
