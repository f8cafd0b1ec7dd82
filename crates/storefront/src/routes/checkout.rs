//! Checkout.
//!
//! Guests may check out; a signed-in customer's order is linked to their
//! account. The order is priced from current product rows inside the
//! order transaction, never from the session.

use axum::{Json, Router, extract::State, routing::post};
use tower_sessions::Session;
use tracing::instrument;

use buildmart_core::ActionResult;
use buildmart_shop::models::{ContactDetails, OrderDetail};
use buildmart_shop::services::OrderService;

use crate::error::{Result, add_breadcrumb};
use crate::extract::ApiJson;
use crate::middleware::{OptionalAuth, api_rate_limiter};
use crate::models::SessionCart;
use crate::routes::cart::{load_cart, save_cart};
use crate::state::AppState;

/// Build the checkout router.
pub fn router(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route("/checkout", post(place_order))
        .layer(api_rate_limiter(trust_proxy_headers))
}

/// Place an order from the session cart and empty the cart.
#[instrument(skip_all, fields(user_id = ?user.as_ref().map(|u| u.id)))]
pub async fn place_order(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    ApiJson(contact): ApiJson<ContactDetails>,
) -> Result<Json<ActionResult<OrderDetail>>> {
    let cart = load_cart(&session).await?;
    add_breadcrumb("checkout", "Placing order", None);

    let detail = OrderService::new(state.pool(), state.events(), state.mailer())
        .place_order(
            user.map(|u| u.id),
            contact,
            &cart.order_items(),
            &state.config().delivery,
        )
        .await?;

    save_cart(&session, &SessionCart::default()).await?;
    Ok(Json(ActionResult::ok(detail)))
}
