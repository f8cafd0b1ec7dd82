//! JSON API route handlers for the storefront.
//!
//! All routes below are nested under `/api`. Responses use the
//! `{"success": bool, "data"?: .., "error"?: ..}` envelope.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /auth/register                       - Create account, sign in
//! POST   /auth/login                          - Sign in
//! POST   /auth/logout                         - Sign out
//!
//! # Account (requires auth)
//! GET    /account                             - Profile
//! PATCH  /account                             - Update name/phone
//! POST   /account/password                    - Change password
//!
//! # Catalog
//! GET    /categories                          - Active categories with counts
//! GET    /categories/{slug}                   - Category with its product types
//! GET    /product-types                       - Product types (?category=slug)
//! GET    /products                            - Filtered, paginated listing
//! GET    /products/{slug}                     - Product detail
//! GET    /products/{slug}/related             - Same-category products
//!
//! # Reviews
//! GET    /products/{slug}/reviews             - Approved reviews
//! POST   /products/{slug}/reviews             - Write a review (auth)
//! PATCH  /reviews/{id}                        - Edit own review (auth)
//! DELETE /reviews/{id}                        - Delete own review (auth)
//!
//! # Cart (session)
//! GET    /cart                                - Priced cart
//! DELETE /cart                                - Empty cart
//! GET    /cart/count                          - Unit count
//! POST   /cart/items                          - Add product
//! PATCH  /cart/items/{product_id}             - Set quantity
//! DELETE /cart/items/{product_id}             - Remove line
//!
//! # Wishlist (requires auth)
//! GET    /wishlist                            - Saved products
//! POST   /wishlist/{product_id}               - Save product
//! DELETE /wishlist/{product_id}               - Unsave product
//! POST   /wishlist/{product_id}/move-to-cart  - Move to cart
//!
//! # Checkout and orders
//! POST   /checkout                            - Place order (guest or auth)
//! GET    /orders                              - Order history (auth)
//! GET    /orders/{order_number}               - Order detail (auth)
//! POST   /orders/{order_number}/cancel        - Cancel pending order (auth)
//!
//! # Support chat (requires auth)
//! GET    /chat/conversations                  - Own conversations
//! POST   /chat/conversations                  - Start conversation
//! GET    /chat/conversations/{id}             - Conversation with messages
//! POST   /chat/conversations/{id}/messages    - Send message
//! POST   /chat/conversations/{id}/read        - Mark staff replies read
//! POST   /chat/conversations/{id}/typing      - Typing indicator
//! POST   /chat/presence                       - Heartbeat
//! GET    /chat/events                         - Server-sent events
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod chat;
pub mod checkout;
pub mod orders;
pub mod reviews;
pub mod wishlist;

use axum::Router;

use crate::state::AppState;

/// Build the API router. `trust_proxy_headers` picks the rate-limit key,
/// see [`crate::middleware::rate_limit`].
pub fn routes(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .merge(auth::router(trust_proxy_headers))
        .merge(account::router())
        .merge(catalog::router())
        .merge(reviews::router())
        .merge(cart::router())
        .merge(wishlist::router())
        .merge(checkout::router(trust_proxy_headers))
        .merge(orders::router())
        .merge(chat::router())
}
