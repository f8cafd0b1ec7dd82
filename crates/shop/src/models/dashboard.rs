//! Admin dashboard aggregates.

use serde::{Deserialize, Serialize};

use buildmart_core::{Money, OrderStatus, ProductId};

use super::OrderSummary;

/// Number of orders in one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Active product at or below the low-stock threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockProduct {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub stock_quantity: i32,
}

/// Everything the dashboard landing page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub orders_by_status: Vec<StatusCount>,
    pub orders_today: i64,
    /// Sum of totals of paid orders.
    pub total_revenue: Money,
    pub revenue_last_30_days: Money,
    pub low_stock: Vec<LowStockProduct>,
    pub pending_reviews: i64,
    pub open_conversations: i64,
    pub unread_customer_messages: i64,
    pub recent_orders: Vec<OrderSummary>,
}
