//! JSON API route handlers for admin.
//!
//! Everything is nested under `/api` and, apart from login, requires a
//! staff session.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /auth/login                        - Staff login
//! POST   /auth/logout                       - Logout
//! GET    /auth/me                           - Current staff member
//!
//! # Dashboard
//! GET    /dashboard                         - Statistics
//!
//! # Catalog
//! GET    /products                          - List (includes inactive)
//! POST   /products                          - Create
//! GET    /products/{id}                     - Detail
//! PUT    /products/{id}                     - Update
//! DELETE /products/{id}                     - Delete
//! POST   /products/{id}/active              - Activate/deactivate
//! POST   /products/{id}/stock               - Adjust stock by delta
//! GET    /categories                        - List
//! POST   /categories                        - Create
//! GET    /categories/{id}                   - Detail
//! PUT    /categories/{id}                   - Update
//! DELETE /categories/{id}                   - Delete (must be empty)
//! GET    /product-types                     - List (?category_id=)
//! POST   /product-types                     - Create
//! PUT    /product-types/{id}                - Update
//! DELETE /product-types/{id}                - Delete
//!
//! # Orders
//! GET    /orders                            - List with filters
//! POST   /orders                            - Manual order
//! GET    /orders/{id}                       - Detail
//! DELETE /orders/{id}                       - Delete pending/cancelled
//! POST   /orders/{id}/status                - Status transition
//! POST   /orders/{id}/payment-status        - Payment status
//! POST   /orders/{id}/notes                 - Internal notes
//!
//! # Reviews
//! GET    /reviews                           - Moderation list
//! POST   /reviews/{id}/approval             - Approve/unapprove
//! DELETE /reviews/{id}                      - Delete
//!
//! # Customers (admin role)
//! GET    /customers                         - List with search
//! POST   /customers/{id}/role               - Change role
//!
//! # Support chat
//! GET    /chat/conversations                - All conversations
//! GET    /chat/conversations/{id}           - Conversation with messages
//! POST   /chat/conversations/{id}/messages  - Reply
//! POST   /chat/conversations/{id}/read      - Mark customer messages read
//! POST   /chat/conversations/{id}/typing    - Typing indicator
//! POST   /chat/conversations/{id}/close     - Close
//! POST   /chat/conversations/{id}/reopen    - Reopen
//! POST   /chat/presence                     - Heartbeat
//! GET    /chat/presence?user_ids=1,2        - Presence lookup
//! GET    /chat/events                       - Server-sent events
//! ```

pub mod auth;
pub mod categories;
pub mod chat;
pub mod customers;
pub mod dashboard;
pub mod orders;
pub mod product_types;
pub mod products;
pub mod reviews;

use axum::Router;

use crate::state::AppState;

/// Build the API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(products::router())
        .merge(categories::router())
        .merge(product_types::router())
        .merge(orders::router())
        .merge(reviews::router())
        .merge(customers::router())
        .merge(chat::router())
}
