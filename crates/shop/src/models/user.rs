//! Account records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use buildmart_core::{Email, Money, UserId, UserRole};

/// A storefront customer or staff account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer row for the admin customer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    #[serde(flatten)]
    pub user: User,
    pub order_count: i64,
    /// Sum of non-cancelled order totals.
    pub total_spent: Money,
}
