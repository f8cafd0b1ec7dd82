//! Customer order history.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use tracing::instrument;

use buildmart_core::{ActionResult, Page, Pagination};
use buildmart_shop::models::{Order, OrderDetail, OrderSummary};
use buildmart_shop::services::OrderService;

use crate::error::Result;
use crate::extract::{ApiPath, ApiQuery};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list))
        .route("/orders/{order_number}", get(show))
        .route("/orders/{order_number}/cancel", post(cancel))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ActionResult<Page<OrderSummary>>>> {
    let orders = OrderService::new(state.pool(), state.events(), state.mailer())
        .list_for_customer(user.id, pagination.clamped())
        .await?;
    Ok(Json(ActionResult::ok(orders)))
}

/// One of the customer's orders. Other customers' orders are not found.
#[instrument(skip_all, fields(user_id = %user.id, order_number = %order_number))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(order_number): ApiPath<String>,
) -> Result<Json<ActionResult<OrderDetail>>> {
    let detail = OrderService::new(state.pool(), state.events(), state.mailer())
        .get_for_customer(&order_number, user.id)
        .await?;
    Ok(Json(ActionResult::ok(detail)))
}

/// Cancel a pending order.
#[instrument(skip_all, fields(user_id = %user.id, order_number = %order_number))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(order_number): ApiPath<String>,
) -> Result<Json<ActionResult<Order>>> {
    let order = OrderService::new(state.pool(), state.events(), state.mailer())
        .cancel_own(&order_number, user.id)
        .await?;
    Ok(Json(ActionResult::ok(order)))
}
