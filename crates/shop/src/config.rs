//! Environment helpers shared by the storefront and admin configs.
//!
//! Each binary owns its own config struct; this module supplies the pieces
//! they have in common: variable lookup, secret validation, and the optional
//! SMTP and Sentry blocks.
//!
//! # Environment Variables
//!
//! ## SMTP (optional, all or nothing)
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM`
//! - `SMTP_PORT` (default: 587)
//!
//! ## Sentry (optional)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`
//! - `SENTRY_SAMPLE_RATE` (default: 1.0), `SENTRY_TRACES_SAMPLE_RATE` (default: 0.0)
//!
//! ## Delivery pricing
//! - `DELIVERY_FLAT_FEE` (default: 25.00)
//! - `DELIVERY_FREE_OVER` (default: 500.00, `none` disables free delivery)

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use buildmart_core::{DeliveryPolicy, Money};

use crate::email::EmailConfig;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const SMTP_VARS: [&str; 4] = ["SMTP_HOST", "SMTP_USERNAME", "SMTP_PASSWORD", "SMTP_FROM"];

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Sentry error tracking settings.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl SentryConfig {
    /// Read the Sentry block.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for a rate outside `0.0..=1.0`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: get_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            traces_sample_rate: get_rate("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }
}

impl EmailConfig {
    /// Read the SMTP block. Returns `None` when none of it is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` when the block is only partly
    /// set, and `ConfigError::InvalidEnvVar` for a bad port.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        if SMTP_VARS.iter().all(|key| get_optional_env(key).is_none()) {
            return Ok(None);
        }

        Ok(Some(Self {
            smtp_host: get_required_env("SMTP_HOST")?,
            smtp_port: parse_env_or("SMTP_PORT", 587)?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: SecretString::from(get_required_env("SMTP_PASSWORD")?),
            from_address: get_required_env("SMTP_FROM")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Load `.env` if present. Missing files are fine.
pub fn load_dotenv() {
    // Missing .env is the normal case in production.
    let _ = dotenvy::dotenv();
}

/// Get a required environment variable.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if unset.
pub fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
#[must_use]
pub fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
#[must_use]
pub fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if the value doesn't parse.
pub fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

fn get_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let rate = parse_env_or(key, default)?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be between 0.0 and 1.0".to_string(),
        ));
    }
    Ok(rate)
}

/// Get database URL with fallback to generic `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` naming `primary_key` if neither is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    get_optional_env(primary_key)
        .or_else(|| get_optional_env("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Load the delivery fee policy from `DELIVERY_FLAT_FEE` and
/// `DELIVERY_FREE_OVER`. `DELIVERY_FREE_OVER=none` disables free delivery.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for unparsable or negative amounts.
pub fn get_delivery_policy() -> Result<DeliveryPolicy, ConfigError> {
    let defaults = DeliveryPolicy::default();
    let flat_fee = parse_money("DELIVERY_FLAT_FEE", get_optional_env("DELIVERY_FLAT_FEE"))?
        .unwrap_or(defaults.flat_fee);
    let free_over = match get_optional_env("DELIVERY_FREE_OVER") {
        Some(value) if value.trim().eq_ignore_ascii_case("none") => None,
        Some(value) => parse_money("DELIVERY_FREE_OVER", Some(value))?,
        None => defaults.free_over,
    };
    Ok(DeliveryPolicy {
        flat_fee,
        free_over,
    })
}

fn parse_money(key: &str, value: Option<String>) -> Result<Option<Money>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let amount: Decimal = value.trim().parse().map_err(|e: rust_decimal::Error| {
        ConfigError::InvalidEnvVar(key.to_string(), e.to_string())
    })?;
    Money::parse_input(amount)
        .map(Some)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Load a public base URL: absolute http(s), trailing slash stripped.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` or `ConfigError::InvalidEnvVar`.
pub fn get_base_url(key: &str) -> Result<String, ConfigError> {
    parse_base_url(key, &get_required_env(key)?)
}

/// Like [`get_base_url`], with a default for unset variables.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if the value isn't an http(s) URL.
pub fn get_base_url_or(key: &str, default: &str) -> Result<String, ConfigError> {
    parse_base_url(key, &get_env_or_default(key, default))
}

fn parse_base_url(key: &str, value: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Load a session secret and check its length, entropy, and that it isn't
/// a placeholder.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` or `ConfigError::InsecureSecret`.
pub fn get_session_secret(key: &str) -> Result<SecretString, ConfigError> {
    let secret = get_validated_secret(key)?;
    validate_session_secret(&secret, key)?;
    Ok(secret)
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_strips_trailing_slash() {
        assert_eq!(
            parse_base_url("STOREFRONT_BASE_URL", "https://shop.buildmart.example/").unwrap(),
            "https://shop.buildmart.example"
        );
        assert_eq!(
            parse_base_url("ADMIN_BASE_URL", "http://localhost:3001").unwrap(),
            "http://localhost:3001"
        );
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(
            parse_money("DELIVERY_FLAT_FEE", Some("25".to_string())).unwrap(),
            Some(Money::from_cents(2_500))
        );
        assert_eq!(parse_money("DELIVERY_FLAT_FEE", None).unwrap(), None);
        assert!(parse_money("DELIVERY_FLAT_FEE", Some("-1".to_string())).is_err());
        assert!(parse_money("DELIVERY_FLAT_FEE", Some("cheap".to_string())).is_err());
    }

    #[test]
    fn test_parse_base_url_rejects_relative_and_other_schemes() {
        assert!(parse_base_url("STOREFRONT_BASE_URL", "/shop").is_err());
        assert!(parse_base_url("STOREFRONT_BASE_URL", "ftp://files.example").is_err());
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-session-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(validate_secret_strength("changeme123", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let err =
            validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").unwrap_err();
        assert!(err.to_string().contains("entropy too low"));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "TEST_SESSION").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "TEST_SESSION").is_ok());
    }

    #[test]
    fn test_parse_env_or_default_when_unset() {
        let port: u16 = parse_env_or("BUILDMART_TEST_UNSET_PORT_VAR", 587).unwrap();
        assert_eq!(port, 587);
    }

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::MissingEnvVar("SMTP_HOST".into()).to_string(),
            "Missing environment variable: SMTP_HOST"
        );
    }
}
