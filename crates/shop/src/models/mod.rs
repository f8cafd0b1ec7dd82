//! Domain models shared by the storefront and admin.
//!
//! Records returned from repositories plus the validated input types that
//! route handlers deserialize and pass down.

pub mod catalog;
pub mod chat;
pub mod dashboard;
pub mod order;
pub mod review;
pub mod user;

pub use catalog::{
    Category, CategoryInput, CategorySummary, Product, ProductDetail, ProductFilter, ProductInput,
    ProductSort, ProductType, ProductTypeInput, ValidCategory, ValidProduct, ValidProductType,
};
pub use chat::{Conversation, ConversationFilter, ConversationSummary, Message, Presence};
pub use dashboard::{DashboardStats, LowStockProduct, StatusCount};
pub use order::{
    ContactDetails, ManualOrderInput, NewOrder, NewOrderItem, Order, OrderDetail, OrderFilter,
    OrderItem, OrderSummary, ShippingAddress, ValidContact,
};
pub use review::{Review, ReviewFilter, ReviewInput, ValidReview};
pub use user::{CustomerSummary, User};

/// Input failed validation. The message is safe to show to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Trim a required text field and enforce a maximum length.
pub(crate) fn required_text(
    value: &str,
    field: &str,
    max_len: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError(format!("{field} is required")));
    }
    if trimmed.chars().count() > max_len {
        return Err(ValidationError(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Trim an optional text field, mapping blank input to `None`.
pub(crate) fn optional_text(
    value: Option<&str>,
    field: &str,
    max_len: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) if v.chars().count() > max_len => Err(ValidationError(format!(
            "{field} must be at most {max_len} characters"
        ))),
        Some(v) => Ok(Some(v.to_owned())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text() {
        assert_eq!(required_text("  Sand ", "Name", 10).unwrap(), "Sand");
        assert_eq!(
            required_text("   ", "Name", 10).unwrap_err().to_string(),
            "Name is required"
        );
        assert!(required_text("abcdefghijk", "Name", 10).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(None, "Notes", 5).unwrap(), None);
        assert_eq!(optional_text(Some("  "), "Notes", 5).unwrap(), None);
        assert_eq!(
            optional_text(Some(" hi "), "Notes", 5).unwrap(),
            Some("hi".to_owned())
        );
        assert!(optional_text(Some("toolong"), "Notes", 5).is_err());
    }
}
