//! Multi-step operations shared by the storefront and admin.
//!
//! # Services
//!
//! - `auth` - Registration, login, password changes
//! - `orders` - Checkout, manual orders, and the order lifecycle
//! - `catalog` - Catalog mutations that also notify other processes
//! - `reviews` - Review creation and moderation
//! - `chat` - Support chat with realtime events and presence
//!
//! Services borrow the pool (and the event hub or mailer where needed) and
//! are constructed per request, like repositories.

pub mod auth;
pub mod catalog;
pub mod chat;
pub mod orders;
pub mod reviews;

pub use auth::{AuthError, AuthService};
pub use catalog::CatalogService;
pub use chat::ChatService;
pub use orders::OrderService;
pub use reviews::ReviewService;

use thiserror::Error;

use crate::db::{PlaceOrderError, RepositoryError};
use crate::events::{CatalogEvent, ChatEvent, EventHub};
use crate::models::ValidationError;

/// Errors returned by catalog, order, review, and chat services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request is well formed but breaks a business rule (out of stock,
    /// closed conversation). The message is safe to show.
    #[error("{0}")]
    Rejected(String),

    /// Repository/database error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<PlaceOrderError> for ServiceError {
    fn from(e: PlaceOrderError) -> Self {
        match e {
            PlaceOrderError::Repository(e) => Self::Repository(e),
            PlaceOrderError::UnknownProduct(_) => {
                Self::Rejected("A product in your order no longer exists".to_owned())
            }
            PlaceOrderError::Pricing(e) => {
                Self::Validation(ValidationError(capitalize(&e.to_string())))
            }
            other @ (PlaceOrderError::Unavailable { .. }
            | PlaceOrderError::InsufficientStock { .. }) => {
                Self::Rejected(capitalize(&other.to_string()))
            }
        }
    }
}

pub(crate) fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Publish a chat event, logging instead of failing: the change itself is
/// already committed.
pub(crate) async fn publish_chat(events: &EventHub, pool: &sqlx::PgPool, event: &ChatEvent) {
    if let Err(e) = events.publish_chat(pool, event).await {
        tracing::warn!(error = %e, "failed to publish chat event");
    }
}

/// Publish a catalog change, logging instead of failing.
pub(crate) async fn publish_catalog(events: &EventHub, pool: &sqlx::PgPool, event: CatalogEvent) {
    if let Err(e) = events.publish_catalog(pool, event).await {
        tracing::warn!(error = %e, ?event, "failed to publish catalog event");
    }
}

#[cfg(test)]
mod tests {
    use buildmart_core::{Money, PricingError, ProductId};

    use super::*;

    #[test]
    fn test_place_order_errors_become_user_messages() {
        let err = ServiceError::from(PlaceOrderError::InsufficientStock {
            name: "Sand 1t bag".to_owned(),
            available: 2,
        });
        assert_eq!(err.to_string(), "Only 2 of Sand 1t bag left in stock");

        let err = ServiceError::from(PlaceOrderError::UnknownProduct(ProductId::new(9)));
        assert!(matches!(err, ServiceError::Rejected(_)));

        let err = ServiceError::from(PlaceOrderError::Pricing(PricingError::DiscountTooLarge {
            discount: Money::from_cents(500),
            value: Money::from_cents(100),
        }));
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Discount of $5.00 exceeds order value of $1.00"
        );
    }

    #[test]
    fn test_repository_errors_pass_through() {
        let err = ServiceError::from(PlaceOrderError::Repository(RepositoryError::NotFound));
        assert!(matches!(err, ServiceError::Repository(RepositoryError::NotFound)));
    }
}
