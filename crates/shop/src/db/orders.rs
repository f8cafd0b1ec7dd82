//! Database operations for orders.
//!
//! Placing an order, cancelling one, and deleting one all adjust product
//! stock, so each runs in a single transaction that locks the affected rows
//! first.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use thiserror::Error;

use buildmart_core::{
    DeliveryMethod, DeliveryPolicy, Email, Money, OrderId, OrderItemId, OrderLine, OrderStatus,
    OrderTotals, Page, Pagination, PaymentMethod, PaymentStatus, PricingError, ProductId, UserId,
};

use super::{RepositoryError, like_pattern};
use crate::models::{
    NewOrder, Order, OrderDetail, OrderFilter, OrderItem, OrderSummary, ShippingAddress,
};

const ORDER_COLUMNS: &str = r"
    o.id, o.order_number, o.user_id, o.customer_name, o.customer_email, o.customer_phone,
    o.delivery_method, o.address_line1, o.address_line2, o.city, o.region, o.postal_code,
    o.status, o.payment_status, o.payment_method, o.subtotal, o.delivery_fee, o.discount,
    o.total, o.notes, o.created_at, o.updated_at
";

/// Conflict message for an order number collision; callers retry with a new number.
pub(crate) const ORDER_NUMBER_TAKEN: &str = "order number already exists";

const ITEM_COUNT: &str =
    "(SELECT count(*) FROM shop.order_item i WHERE i.order_id = o.id) AS item_count";

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A requested product does not exist.
    #[error("product {0} does not exist")]
    UnknownProduct(ProductId),

    /// A requested product has been deactivated.
    #[error("{name} is no longer available")]
    Unavailable { name: String },

    /// Not enough stock to cover the requested quantity.
    #[error("only {available} of {name} left in stock")]
    InsufficientStock { name: String, available: i32 },

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl From<sqlx::Error> for PlaceOrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: Option<UserId>,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    delivery_method: DeliveryMethod,
    address_line1: Option<String>,
    address_line2: Option<String>,
    city: Option<String>,
    region: Option<String>,
    postal_code: Option<String>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: PaymentMethod,
    subtotal: Money,
    delivery_fee: Money,
    discount: Money,
    total: Money,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let customer_email = Email::parse(&row.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "invalid email on order {}: {e}",
                row.order_number
            ))
        })?;

        let shipping_address = match (row.address_line1, row.city) {
            (Some(line1), Some(city)) => Some(ShippingAddress {
                line1,
                line2: row.address_line2,
                city,
                region: row.region,
                postal_code: row.postal_code,
            }),
            _ => None,
        };

        let totals = OrderTotals {
            subtotal: row.subtotal,
            delivery_fee: row.delivery_fee,
            discount: row.discount,
            total: row.total,
        };
        if !totals.is_consistent() {
            return Err(RepositoryError::DataCorruption(format!(
                "inconsistent totals on order {}",
                row.order_number
            )));
        }

        Ok(Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            customer_name: row.customer_name,
            customer_email,
            customer_phone: row.customer_phone,
            delivery_method: row.delivery_method,
            shipping_address,
            status: row.status,
            payment_status: row.payment_status,
            payment_method: row.payment_method,
            totals,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    #[sqlx(flatten)]
    order: OrderRow,
    item_count: i64,
}

impl TryFrom<OrderSummaryRow> for OrderSummary {
    type Error = RepositoryError;

    fn try_from(row: OrderSummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            order: row.order.try_into()?,
            item_count: row.item_count,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    product_name: String,
    product_sku: String,
    unit_price: Money,
    quantity: i32,
    line_total: Money,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            product_sku: row.product_sku,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
        }
    }
}

/// Product fields needed while placing an order, read under a row lock.
#[derive(Debug, sqlx::FromRow)]
struct LockedProductRow {
    id: ProductId,
    name: String,
    sku: String,
    price: Money,
    stock_quantity: i32,
    is_active: bool,
}

// =============================================================================
// Helpers
// =============================================================================

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    if let Some(status) = filter.status {
        query.push(" AND o.status = ").push_bind(status);
    }
    if let Some(payment_status) = filter.payment_status {
        query.push(" AND o.payment_status = ").push_bind(payment_status);
    }
    if let Some(search) = filter.search() {
        let pattern = like_pattern(search);
        query
            .push(" AND (o.order_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR o.customer_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR o.customer_email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(from) = filter.from {
        query
            .push(" AND (o.created_at AT TIME ZONE 'UTC')::date >= ")
            .push_bind(from);
    }
    if let Some(to) = filter.to {
        query
            .push(" AND (o.created_at AT TIME ZONE 'UTC')::date <= ")
            .push_bind(to);
    }
}

async fn fetch_items(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT id, order_id, product_id, product_name, product_sku, unit_price, quantity, line_total
        FROM shop.order_item
        WHERE order_id = $1
        ORDER BY id
        ",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Put an order's quantities back on the shelf.
async fn restore_stock(conn: &mut PgConnection, order_id: OrderId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE shop.product p
        SET stock_quantity = p.stock_quantity + i.quantity, updated_at = now()
        FROM (
            SELECT product_id, sum(quantity)::int AS quantity
            FROM shop.order_item
            WHERE order_id = $1
            GROUP BY product_id
        ) i
        WHERE p.id = i.product_id
        ",
    )
    .bind(order_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Lock an order row and return its status and owner.
async fn lock_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<(OrderStatus, Option<UserId>), RepositoryError> {
    sqlx::query_as::<_, (OrderStatus, Option<UserId>)>(
        "SELECT status, user_id FROM shop.customer_order WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}

async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        UPDATE shop.customer_order o
        SET status = $2, updated_at = now()
        WHERE o.id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status)
    .fetch_one(conn)
    .await?;

    row.try_into()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order.
    ///
    /// Locks the requested products, checks they are active and in stock,
    /// snapshots their names and prices, prices the order, inserts the order
    /// and its items, and decrements stock. Either all of this happens or
    /// none of it does.
    ///
    /// `new_order.items` must already be normalized (no duplicate products).
    ///
    /// # Errors
    ///
    /// Returns a `PlaceOrderError` describing the first product that can't be
    /// supplied, a pricing error, or a database error.
    pub async fn create(
        &self,
        new_order: &NewOrder,
        order_number: &str,
        policy: &DeliveryPolicy,
    ) -> Result<OrderDetail, PlaceOrderError> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<i32> = new_order.items.iter().map(|i| i.product_id.as_i32()).collect();
        // Lock in id order so concurrent checkouts can't deadlock.
        let products = sqlx::query_as::<_, LockedProductRow>(
            r"
            SELECT id, name, sku, price, stock_quantity, is_active
            FROM shop.product
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(new_order.items.len());
        for item in &new_order.items {
            let product = products
                .iter()
                .find(|p| p.id == item.product_id)
                .ok_or(PlaceOrderError::UnknownProduct(item.product_id))?;
            if !product.is_active {
                return Err(PlaceOrderError::Unavailable {
                    name: product.name.clone(),
                });
            }
            let quantity = i32::try_from(item.quantity).unwrap_or(i32::MAX);
            if product.stock_quantity < quantity {
                return Err(PlaceOrderError::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock_quantity,
                });
            }
            lines.push((product, quantity, OrderLine {
                unit_price: product.price,
                quantity: item.quantity,
            }));
        }

        let priced: Vec<OrderLine> = lines.iter().map(|(_, _, line)| *line).collect();
        let contact = &new_order.contact;
        let totals = OrderTotals::compute(
            &priced,
            contact.delivery_method,
            policy,
            new_order.discount,
        )?;
        let address = contact.shipping_address.as_ref();

        let order_row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO shop.customer_order AS o (
                order_number, user_id, customer_name, customer_email, customer_phone,
                delivery_method, address_line1, address_line2, city, region, postal_code,
                status, payment_status, payment_method, subtotal, delivery_fee, discount,
                total, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order_number)
        .bind(new_order.user_id)
        .bind(&contact.customer_name)
        .bind(contact.customer_email.as_str())
        .bind(&contact.customer_phone)
        .bind(contact.delivery_method)
        .bind(address.map(|a| a.line1.as_str()))
        .bind(address.and_then(|a| a.line2.as_deref()))
        .bind(address.map(|a| a.city.as_str()))
        .bind(address.and_then(|a| a.region.as_deref()))
        .bind(address.and_then(|a| a.postal_code.as_deref()))
        .bind(new_order.status)
        .bind(new_order.payment_status)
        .bind(contact.payment_method)
        .bind(totals.subtotal)
        .bind(totals.delivery_fee)
        .bind(totals.discount)
        .bind(totals.total)
        .bind(&contact.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            RepositoryError::from_constraint(
                e,
                ORDER_NUMBER_TAKEN,
                "customer account does not exist",
            )
        })?;
        let order: Order = order_row.try_into()?;

        let mut items = Vec::with_capacity(lines.len());
        for (product, quantity, line) in &lines {
            let item = sqlx::query_as::<_, OrderItemRow>(
                r"
                INSERT INTO shop.order_item (
                    order_id, product_id, product_name, product_sku, unit_price, quantity,
                    line_total
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, order_id, product_id, product_name, product_sku, unit_price,
                          quantity, line_total
                ",
            )
            .bind(order.id)
            .bind(product.id)
            .bind(&product.name)
            .bind(&product.sku)
            .bind(line.unit_price)
            .bind(*quantity)
            .bind(line.line_total())
            .fetch_one(&mut *tx)
            .await?;
            items.push(item.into());

            sqlx::query(
                r"
                UPDATE shop.product
                SET stock_quantity = stock_quantity - $2, updated_at = now()
                WHERE id = $1
                ",
            )
            .bind(product.id)
            .bind(*quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(OrderDetail { order, items })
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.customer_order o WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order: Order = row.try_into()?;
        let items = fetch_items(&mut conn, order.id).await?;
        Ok(Some(OrderDetail { order, items }))
    }

    /// Get an order by its public order number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.customer_order o WHERE o.order_number = $1"
        ))
        .bind(order_number)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order: Order = row.try_into()?;
        let items = fetch_items(&mut conn, order.id).await?;
        Ok(Some(OrderDetail { order, items }))
    }

    /// List orders for the admin, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Page<OrderSummary>, RepositoryError> {
        let pagination = filter.pagination();

        let mut count = QueryBuilder::new("SELECT count(*) FROM shop.customer_order o WHERE true");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query = QueryBuilder::new(format!(
            "SELECT {ORDER_COLUMNS}, {ITEM_COUNT} FROM shop.customer_order o WHERE true"
        ));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows: Vec<OrderSummaryRow> = query.build_query_as().fetch_all(self.pool).await?;
        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, pagination, total))
    }

    /// List a customer's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> Result<Page<OrderSummary>, RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM shop.customer_order WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, OrderSummaryRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}, {ITEM_COUNT}
            FROM shop.customer_order o
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, pagination, total))
    }

    /// The most recent orders across all customers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}, {ITEM_COUNT}
            FROM shop.customer_order o
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $1
            "
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Move an order to a new status, restoring stock when it is cancelled.
    ///
    /// Returns the previous status alongside the updated order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Conflict` if the transition isn't allowed.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<(OrderStatus, Order), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let (current, _) = lock_order(&mut tx, id).await?;

        if !current.can_transition_to(next) {
            return Err(RepositoryError::Conflict(format!(
                "Cannot change order status from {current} to {next}"
            )));
        }
        if current.holds_stock() && !next.holds_stock() {
            restore_stock(&mut tx, id).await?;
        }
        let order = set_status(&mut tx, id, next).await?;

        tx.commit().await?;
        Ok((current, order))
    }

    /// Cancel a customer's own pending order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist or
    /// belongs to someone else.
    /// Returns `RepositoryError::Conflict` once the order has left `pending`.
    pub async fn cancel_for_user(
        &self,
        order_number: &str,
        user_id: UserId,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, OrderId>(
            "SELECT id FROM shop.customer_order WHERE order_number = $1",
        )
        .bind(order_number)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let (current, owner) = lock_order(&mut tx, id).await?;
        if owner != Some(user_id) {
            return Err(RepositoryError::NotFound);
        }
        if current != OrderStatus::Pending {
            return Err(RepositoryError::Conflict(format!(
                "Only pending orders can be cancelled; this order is {current}"
            )));
        }

        restore_stock(&mut tx, id).await?;
        let order = set_status(&mut tx, id, OrderStatus::Cancelled).await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Set an order's payment status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE shop.customer_order o
            SET payment_status = $2, updated_at = now()
            WHERE o.id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(payment_status)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Replace an order's internal notes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update_notes(
        &self,
        id: OrderId,
        notes: Option<&str>,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE shop.customer_order o
            SET notes = $2, updated_at = now()
            WHERE o.id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(notes)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a pending or cancelled order. Stock held by a pending order is
    /// restored first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Conflict` for orders in any other status.
    pub async fn delete(&self, id: OrderId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let (current, _) = lock_order(&mut tx, id).await?;

        match current {
            OrderStatus::Pending => restore_stock(&mut tx, id).await?,
            OrderStatus::Cancelled => {}
            other => {
                return Err(RepositoryError::Conflict(format!(
                    "Only pending or cancelled orders can be deleted; this order is {other}"
                )));
            }
        }

        sqlx::query("DELETE FROM shop.customer_order WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_push_filters_sql() {
        let filter = OrderFilter {
            status: Some(OrderStatus::Shipped),
            q: Some("BM-2026".to_owned()),
            from: NaiveDate::from_ymd_opt(2026, 3, 1),
            ..OrderFilter::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("WHERE true");
        push_filters(&mut query, &filter);
        assert_eq!(
            query.sql(),
            "WHERE true AND o.status = $1 AND (o.order_number ILIKE $2 \
             OR o.customer_name ILIKE $3 OR o.customer_email ILIKE $4) \
             AND (o.created_at AT TIME ZONE 'UTC')::date >= $5"
        );
    }

    #[test]
    fn test_place_order_error_messages() {
        let err = PlaceOrderError::InsufficientStock {
            name: "Rebar 12mm".to_owned(),
            available: 3,
        };
        assert_eq!(err.to_string(), "only 3 of Rebar 12mm left in stock");

        let err = PlaceOrderError::from(PricingError::Empty);
        assert_eq!(err.to_string(), "order must contain at least one item");
    }
}
