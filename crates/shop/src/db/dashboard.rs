//! Aggregate queries for the admin dashboard.

use sqlx::PgPool;

use buildmart_core::{Money, OrderStatus, ProductId};

use super::{ChatRepository, OrderRepository, RepositoryError};
use crate::models::{DashboardStats, LowStockProduct, StatusCount};

const RECENT_ORDERS: i64 = 5;
const LOW_STOCK_LIMIT: i64 = 20;

#[derive(Debug, sqlx::FromRow)]
struct RevenueRow {
    orders_today: i64,
    total_revenue: Money,
    revenue_last_30_days: Money,
    pending_reviews: i64,
    open_conversations: i64,
}

/// Repository for dashboard statistics.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Collect every dashboard figure.
    ///
    /// Revenue counts paid orders only. Statuses with no orders are reported
    /// with a zero count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn stats(&self, low_stock_threshold: i32) -> Result<DashboardStats, RepositoryError> {
        let counts = sqlx::query_as::<_, (OrderStatus, i64)>(
            "SELECT status, count(*) FROM shop.customer_order GROUP BY status",
        )
        .fetch_all(self.pool)
        .await?;
        let orders_by_status = OrderStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: *status,
                count: counts
                    .iter()
                    .find(|(s, _)| s == status)
                    .map_or(0, |(_, n)| *n),
            })
            .collect();

        let figures = sqlx::query_as::<_, RevenueRow>(
            r"
            SELECT
                (SELECT count(*) FROM shop.customer_order
                 WHERE created_at >= date_trunc('day', now())) AS orders_today,
                (SELECT COALESCE(sum(total), 0) FROM shop.customer_order
                 WHERE payment_status = 'paid') AS total_revenue,
                (SELECT COALESCE(sum(total), 0) FROM shop.customer_order
                 WHERE payment_status = 'paid'
                   AND created_at >= now() - interval '30 days') AS revenue_last_30_days,
                (SELECT count(*) FROM shop.review WHERE NOT is_approved) AS pending_reviews,
                (SELECT count(*) FROM shop.conversation WHERE status = 'open')
                    AS open_conversations
            ",
        )
        .fetch_one(self.pool)
        .await?;

        let low_stock = sqlx::query_as::<_, (ProductId, String, String, i32)>(
            r"
            SELECT id, name, sku, stock_quantity
            FROM shop.product
            WHERE is_active AND stock_quantity <= $1
            ORDER BY stock_quantity, name
            LIMIT $2
            ",
        )
        .bind(low_stock_threshold)
        .bind(LOW_STOCK_LIMIT)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|(id, name, sku, stock_quantity)| LowStockProduct {
            id,
            name,
            sku,
            stock_quantity,
        })
        .collect();

        let unread_customer_messages = ChatRepository::new(self.pool)
            .unread_customer_messages()
            .await?;
        let recent_orders = OrderRepository::new(self.pool).recent(RECENT_ORDERS).await?;

        Ok(DashboardStats {
            orders_by_status,
            orders_today: figures.orders_today,
            total_revenue: figures.total_revenue,
            revenue_last_30_days: figures.revenue_last_30_days,
            low_stock,
            pending_reviews: figures.pending_reviews,
            open_conversations: figures.open_conversations,
            unread_customer_messages,
            recent_orders,
        })
    }
}
