//! Order records and checkout inputs.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use buildmart_core::{
    DeliveryMethod, Email, Money, OrderId, OrderItemId, OrderStatus, OrderTotals, Pagination,
    PaymentMethod, PaymentStatus, ProductId, UserId,
};

use super::{ValidationError, optional_text, required_text};

const MAX_NAME_LENGTH: usize = 120;
const MAX_PHONE_LENGTH: usize = 32;
const MAX_ADDRESS_LENGTH: usize = 200;
pub(crate) const MAX_NOTES_LENGTH: usize = 2_000;
/// Largest quantity accepted for a single line.
pub const MAX_LINE_QUANTITY: u32 = 999;

// =============================================================================
// Records
// =============================================================================

/// Where a delivery order goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: Option<String>,
}

impl ShippingAddress {
    /// Single-line rendering for emails and order lists.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts: Vec<&str> = vec![&self.line1];
        parts.extend(self.line2.as_deref());
        parts.push(&self.city);
        parts.extend(self.region.as_deref());
        parts.extend(self.postal_code.as_deref());
        parts.join(", ")
    }
}

/// An order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-facing reference, e.g. `BM-20260314-4K7Q2Z`.
    pub order_number: String,
    /// `None` for guest checkouts.
    pub user_id: Option<UserId>,
    pub customer_name: String,
    pub customer_email: Email,
    pub customer_phone: Option<String>,
    pub delivery_method: DeliveryMethod,
    pub shipping_address: Option<ShippingAddress>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line on an order, with the product name and price captured at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_sku: String,
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
}

/// Order header plus its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Order header plus item count, for list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub item_count: i64,
}

// =============================================================================
// Filters
// =============================================================================

/// Admin order list filter, parsed from query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Matches order number, customer name, or customer email.
    pub q: Option<String>,
    /// Inclusive start date (UTC).
    pub from: Option<NaiveDate>,
    /// Inclusive end date (UTC).
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl OrderFilter {
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        Pagination::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(Pagination::DEFAULT_PER_PAGE),
        )
    }

    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Contact and delivery details collected at checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactDetails {
    pub customer_name: String,
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Validated contact details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidContact {
    pub customer_name: String,
    pub customer_email: Email,
    pub customer_phone: Option<String>,
    pub delivery_method: DeliveryMethod,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl ContactDetails {
    /// Validate the form. Delivery orders need at least an address line and
    /// a city; pickup orders drop any address that was sent.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` describing the first invalid field.
    pub fn validate(self) -> Result<ValidContact, ValidationError> {
        let customer_name = required_text(&self.customer_name, "Name", MAX_NAME_LENGTH)?;
        let customer_email = Email::parse(&self.customer_email)
            .map_err(|e| ValidationError(format!("Email address is invalid: {e}")))?;
        let customer_phone =
            optional_text(self.customer_phone.as_deref(), "Phone", MAX_PHONE_LENGTH)?;
        if let Some(phone) = &customer_phone
            && !phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
        {
            return Err(ValidationError::new("Phone number contains invalid characters"));
        }

        let shipping_address = match self.delivery_method {
            DeliveryMethod::Pickup => None,
            DeliveryMethod::Delivery => Some(ShippingAddress {
                line1: required_text(
                    self.address_line1.as_deref().unwrap_or_default(),
                    "Address",
                    MAX_ADDRESS_LENGTH,
                )?,
                line2: optional_text(
                    self.address_line2.as_deref(),
                    "Address line 2",
                    MAX_ADDRESS_LENGTH,
                )?,
                city: required_text(
                    self.city.as_deref().unwrap_or_default(),
                    "City",
                    MAX_NAME_LENGTH,
                )?,
                region: optional_text(self.region.as_deref(), "Region", MAX_NAME_LENGTH)?,
                postal_code: optional_text(self.postal_code.as_deref(), "Postal code", 16)?,
            }),
        };

        let notes = optional_text(self.notes.as_deref(), "Notes", MAX_NOTES_LENGTH)?;

        Ok(ValidContact {
            customer_name,
            customer_email,
            customer_phone,
            delivery_method: self.delivery_method,
            shipping_address,
            payment_method: self.payment_method,
            notes,
        })
    }
}

/// A requested order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Everything needed to place an order. Prices are looked up inside the
/// order transaction, never taken from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub contact: ValidContact,
    pub items: Vec<NewOrderItem>,
    pub discount: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

impl NewOrder {
    /// Merge duplicate product lines and reject empty or oversized quantities.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for an empty order or a bad quantity.
    pub fn normalize_items(items: &[NewOrderItem]) -> Result<Vec<NewOrderItem>, ValidationError> {
        let mut merged: Vec<NewOrderItem> = Vec::with_capacity(items.len());
        for item in items {
            if item.quantity == 0 {
                return Err(ValidationError::new("Quantity must be at least 1"));
            }
            match merged.iter_mut().find(|m| m.product_id == item.product_id) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
                None => merged.push(*item),
            }
        }
        if merged.is_empty() {
            return Err(ValidationError::new("Order must contain at least one item"));
        }
        if merged.iter().any(|m| m.quantity > MAX_LINE_QUANTITY) {
            return Err(ValidationError(format!(
                "Quantity per product cannot exceed {MAX_LINE_QUANTITY}"
            )));
        }
        Ok(merged)
    }
}

/// Staff-entered order (phone or counter sale).
#[derive(Debug, Clone, Deserialize)]
pub struct ManualOrderInput {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(flatten)]
    pub contact: ContactDetails,
    pub items: Vec<NewOrderItem>,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn contact(method: DeliveryMethod) -> ContactDetails {
        ContactDetails {
            customer_name: "  Dana Builder ".to_owned(),
            customer_email: "Dana@Example.com".to_owned(),
            customer_phone: Some("+1 (555) 010-2000".to_owned()),
            delivery_method: method,
            address_line1: Some("12 Quarry Rd".to_owned()),
            address_line2: None,
            city: Some("Springfield".to_owned()),
            region: None,
            postal_code: Some("12345".to_owned()),
            payment_method: PaymentMethod::BankTransfer,
            notes: None,
        }
    }

    #[test]
    fn test_delivery_contact_requires_address() {
        let valid = contact(DeliveryMethod::Delivery).validate().unwrap();
        assert_eq!(valid.customer_name, "Dana Builder");
        assert_eq!(valid.customer_email.as_str(), "dana@example.com");
        assert_eq!(
            valid.shipping_address.unwrap().one_line(),
            "12 Quarry Rd, Springfield, 12345"
        );

        let mut missing = contact(DeliveryMethod::Delivery);
        missing.city = None;
        assert_eq!(
            missing.validate().unwrap_err().to_string(),
            "City is required"
        );
    }

    #[test]
    fn test_pickup_contact_drops_address() {
        let mut input = contact(DeliveryMethod::Pickup);
        input.address_line1 = None;
        let valid = input.validate().unwrap();
        assert!(valid.shipping_address.is_none());
    }

    #[test]
    fn test_contact_rejects_bad_email_and_phone() {
        let mut input = contact(DeliveryMethod::Pickup);
        input.customer_email = "nope".to_owned();
        assert!(input.validate().is_err());

        let mut input = contact(DeliveryMethod::Pickup);
        input.customer_phone = Some("call me".to_owned());
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_normalize_items_merges_duplicates() {
        let items = [
            NewOrderItem { product_id: ProductId::new(1), quantity: 2 },
            NewOrderItem { product_id: ProductId::new(2), quantity: 1 },
            NewOrderItem { product_id: ProductId::new(1), quantity: 3 },
        ];
        let merged = NewOrder::normalize_items(&items).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].quantity, 5);
    }

    #[test]
    fn test_normalize_items_rejects_bad_quantities() {
        assert!(NewOrder::normalize_items(&[]).is_err());
        assert!(
            NewOrder::normalize_items(&[NewOrderItem {
                product_id: ProductId::new(1),
                quantity: 0
            }])
            .is_err()
        );
        assert!(
            NewOrder::normalize_items(&[NewOrderItem {
                product_id: ProductId::new(1),
                quantity: MAX_LINE_QUANTITY + 1
            }])
            .is_err()
        );
    }

    #[test]
    fn test_manual_order_input_deserializes_flattened_contact() {
        let json = serde_json::json!({
            "customer_name": "Site Office",
            "customer_email": "office@site.example",
            "delivery_method": "pickup",
            "items": [{"product_id": 3, "quantity": 10}],
            "discount": "5.00",
            "status": "confirmed"
        });
        let input: ManualOrderInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.items.len(), 1);
        assert_eq!(input.status, OrderStatus::Confirmed);
        assert_eq!(input.contact.payment_method, PaymentMethod::CashOnDelivery);
        assert_eq!(input.discount, Decimal::new(500, 2));
    }
}
