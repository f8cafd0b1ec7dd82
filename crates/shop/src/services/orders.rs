//! Checkout and the order lifecycle.
//!
//! Every path that changes stock (placing, cancelling, deleting) also
//! publishes a catalog event per affected product so storefront caches
//! drop stale stock levels.

use chrono::{NaiveDate, Utc};
use rand::seq::IndexedRandom;
use sqlx::PgPool;
use tracing::instrument;

use buildmart_core::{
    DeliveryPolicy, Money, OrderId, OrderStatus, Page, Pagination, PaymentStatus, ProductId,
    UserId,
};

use super::{ServiceError, publish_catalog};
use crate::db::orders::ORDER_NUMBER_TAKEN;
use crate::db::{OrderRepository, PlaceOrderError, RepositoryError};
use crate::email::Mailer;
use crate::events::{CatalogEntity, CatalogEvent, EventHub};
use crate::models::order::MAX_NOTES_LENGTH;
use crate::models::{
    ContactDetails, ManualOrderInput, NewOrder, NewOrderItem, Order, OrderDetail, OrderFilter,
    OrderSummary, ValidationError, optional_text,
};

/// Characters used in the random part of an order number. No `0/O` or `1/I`.
const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ORDER_NUMBER_SUFFIX_LEN: usize = 6;
const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Generate an order number of the form `BM-YYYYMMDD-XXXXXX`.
#[must_use]
pub fn generate_order_number(date: NaiveDate) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_NUMBER_SUFFIX_LEN)
        .filter_map(|_| ORDER_NUMBER_ALPHABET.choose(&mut rng))
        .map(|b| char::from(*b))
        .collect();
    format!("BM-{}-{suffix}", date.format("%Y%m%d"))
}

/// Order operations for both binaries.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
    events: &'a EventHub,
    mailer: &'a Mailer,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, events: &'a EventHub, mailer: &'a Mailer) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
            events,
            mailer,
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Place a storefront order from the cart.
    ///
    /// Guests pass `user_id = None`. The confirmation email is sent in the
    /// background.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for bad contact details or an empty
    /// cart, `ServiceError::Rejected` when stock or availability changed
    /// since the cart was filled.
    #[instrument(skip(self, contact, items, policy), fields(items = items.len()))]
    pub async fn place_order(
        &self,
        user_id: Option<UserId>,
        contact: ContactDetails,
        items: &[NewOrderItem],
        policy: &DeliveryPolicy,
    ) -> Result<OrderDetail, ServiceError> {
        if items.is_empty() {
            return Err(ValidationError::new("Your cart is empty").into());
        }
        let new_order = NewOrder {
            user_id,
            contact: contact.validate()?,
            items: NewOrder::normalize_items(items)?,
            discount: Money::ZERO,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
        };

        let detail = self.create(&new_order, policy).await?;
        tracing::info!(
            order_number = %detail.order.order_number,
            total = %detail.order.totals.total,
            "order placed"
        );
        self.mailer.send_order_confirmation(&detail);
        Ok(detail)
    }

    /// Create a staff-entered order with an optional discount.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for bad input (including a
    /// discount larger than the order), `ServiceError::Rejected` for stock
    /// problems.
    #[instrument(skip(self, input, policy))]
    pub async fn create_manual(
        &self,
        input: ManualOrderInput,
        policy: &DeliveryPolicy,
    ) -> Result<OrderDetail, ServiceError> {
        if input.status == OrderStatus::Cancelled {
            return Err(ValidationError::new("New orders cannot be created as cancelled").into());
        }
        let discount = Money::parse_input(input.discount)
            .map_err(|e| ValidationError(format!("Discount is invalid: {e}")))?;
        let new_order = NewOrder {
            user_id: input.user_id,
            contact: input.contact.validate()?,
            items: NewOrder::normalize_items(&input.items)?,
            discount,
            status: input.status,
            payment_status: input.payment_status,
        };

        let detail = self.create(&new_order, policy).await?;
        tracing::info!(order_number = %detail.order.order_number, "manual order created");
        self.mailer.send_order_confirmation(&detail);
        Ok(detail)
    }

    /// Insert the order, retrying with a fresh number on the (rare) collision.
    async fn create(
        &self,
        new_order: &NewOrder,
        policy: &DeliveryPolicy,
    ) -> Result<OrderDetail, ServiceError> {
        let mut attempt = 0;
        let detail = loop {
            attempt += 1;
            let number = generate_order_number(Utc::now().date_naive());
            match self.orders.create(new_order, &number, policy).await {
                Err(PlaceOrderError::Repository(RepositoryError::Conflict(msg)))
                    if msg == ORDER_NUMBER_TAKEN && attempt < ORDER_NUMBER_ATTEMPTS =>
                {
                    tracing::warn!(%number, "order number collision, retrying");
                }
                other => break other?,
            }
        };

        self.stock_changed(detail.items.iter().map(|i| i.product_id))
            .await;
        Ok(detail)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` (as a service error) if missing.
    pub async fn get(&self, id: OrderId) -> Result<OrderDetail, ServiceError> {
        Ok(self
            .orders
            .get_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound)?)
    }

    /// Get a customer's own order by number. Orders of other customers are
    /// reported as not found.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if missing or not owned.
    pub async fn get_for_customer(
        &self,
        order_number: &str,
        user_id: UserId,
    ) -> Result<OrderDetail, ServiceError> {
        match self.orders.get_by_number(order_number).await? {
            Some(detail) if detail.order.user_id == Some(user_id) => Ok(detail),
            _ => Err(RepositoryError::NotFound.into()),
        }
    }

    /// A customer's order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list_for_customer(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> Result<Page<OrderSummary>, ServiceError> {
        Ok(self.orders.list_for_user(user_id, pagination).await?)
    }

    /// Admin order list.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Page<OrderSummary>, ServiceError> {
        Ok(self.orders.list(filter).await?)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Move an order to a new status and email the customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for a transition that isn't allowed.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, ServiceError> {
        let (previous, order) = self.orders.update_status(id, next).await?;
        tracing::info!(order_number = %order.order_number, %previous, %next, "order status changed");

        if previous.holds_stock() && !next.holds_stock() {
            self.restock_events(id).await;
        }
        self.mailer.send_order_status(&order);
        Ok(order)
    }

    /// Cancel a customer's own pending order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order isn't theirs, and
    /// `RepositoryError::Conflict` once it has left `pending`.
    #[instrument(skip(self))]
    pub async fn cancel_own(
        &self,
        order_number: &str,
        user_id: UserId,
    ) -> Result<Order, ServiceError> {
        let order = self.orders.cancel_for_user(order_number, user_id).await?;
        tracing::info!(order_number = %order.order_number, "order cancelled by customer");

        self.restock_events(order.id).await;
        self.mailer.send_order_status(&order);
        Ok(order)
    }

    /// Set the payment status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order, ServiceError> {
        Ok(self.orders.update_payment_status(id, payment_status).await?)
    }

    /// Replace the order notes. Blank notes clear them.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` if the notes are too long.
    pub async fn update_notes(
        &self,
        id: OrderId,
        notes: Option<&str>,
    ) -> Result<Order, ServiceError> {
        let notes = optional_text(notes, "Notes", MAX_NOTES_LENGTH)?;
        Ok(self.orders.update_notes(id, notes.as_deref()).await?)
    }

    /// Delete a pending or cancelled order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for orders in any other status.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: OrderId) -> Result<(), ServiceError> {
        let detail = self
            .orders
            .get_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        self.orders.delete(id).await?;
        tracing::info!(order_number = %detail.order.order_number, "order deleted");

        if detail.order.status == OrderStatus::Pending {
            self.stock_changed(detail.items.iter().map(|i| i.product_id))
                .await;
        }
        Ok(())
    }

    async fn restock_events(&self, id: OrderId) {
        match self.orders.get_by_id(id).await {
            Ok(Some(detail)) => {
                self.stock_changed(detail.items.iter().map(|i| i.product_id))
                    .await;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to load order items for cache refresh"),
        }
    }

    async fn stock_changed(&self, products: impl Iterator<Item = ProductId>) {
        for id in products {
            let event = CatalogEvent {
                entity: CatalogEntity::Product,
                id: id.as_i32(),
            };
            publish_catalog(self.events, self.pool, event).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let number = generate_order_number(date);

        assert_eq!(number.len(), "BM-20260309-".len() + ORDER_NUMBER_SUFFIX_LEN);
        assert!(number.starts_with("BM-20260309-"));
        let suffix = &number["BM-20260309-".len()..];
        assert!(suffix.bytes().all(|b| ORDER_NUMBER_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_order_numbers_differ() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let numbers: std::collections::HashSet<_> =
            (0..50).map(|_| generate_order_number(date)).collect();
        assert!(numbers.len() > 45);
    }

    #[test]
    fn test_alphabet_has_no_ambiguous_characters() {
        for c in [b'0', b'O', b'1', b'I'] {
            assert!(!ORDER_NUMBER_ALPHABET.contains(&c));
        }
    }
}
