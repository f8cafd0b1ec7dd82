//! Database operations for the `shop` schema.
//!
//! # Tables
//!
//! - `user`, `user_password` - Accounts and Argon2 password hashes
//! - `category`, `product_type`, `product` - Catalog
//! - `customer_order`, `order_item` - Orders with snapshotted line items
//! - `review`, `wishlist_item` - Customer feedback and saved products
//! - `conversation`, `message`, `presence` - Support chat
//! - `storefront_session`, `admin_session` - tower-sessions stores
//!
//! Repositories borrow the pool and are cheap to construct per request.
//! Queries are built at runtime with `query_as` and `QueryBuilder`, mapping
//! through internal `*Row` types into the domain models.

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub mod categories;
pub mod chat;
pub mod dashboard;
pub mod orders;
pub mod product_types;
pub mod products;
pub mod reviews;
pub mod users;
pub mod wishlist;

pub use categories::CategoryRepository;
pub use chat::ChatRepository;
pub use dashboard::DashboardRepository;
pub use orders::{OrderRepository, PlaceOrderError};
pub use product_types::ProductTypeRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use users::UserRepository;
pub use wishlist::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique slug, referenced product).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique and foreign-key violations to `Conflict` with a readable
    /// message; everything else stays a database error.
    ///
    /// `unique` is used for unique violations, `referenced` for foreign-key
    /// violations (a delete blocked by dependants, or an insert pointing at a
    /// missing parent).
    pub(crate) fn from_constraint(e: sqlx::Error, unique: &str, referenced: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return Self::Conflict(unique.to_owned());
            }
            if db_err.is_foreign_key_violation() {
                return Self::Conflict(referenced.to_owned());
            }
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Escape `%`, `_`, and `\` for use inside an `ILIKE` pattern.
pub(crate) fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("cement"), "%cement%");
        assert_eq!(like_pattern(" 50%_off\\ "), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn test_repository_error_display() {
        assert_eq!(RepositoryError::NotFound.to_string(), "not found");
        assert_eq!(
            RepositoryError::Conflict("slug already exists".into()).to_string(),
            "constraint violation: slug already exists"
        );
    }

    #[test]
    fn test_from_constraint_passes_through_other_errors() {
        let err = RepositoryError::from_constraint(sqlx::Error::RowNotFound, "dup", "ref");
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
    }
}
