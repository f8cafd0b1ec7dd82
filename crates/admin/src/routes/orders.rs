//! Order management.
//!
//! Staff can list, inspect, and create orders (phone or counter sales),
//! move them through the status workflow, and record payments.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use buildmart_core::{ActionResult, OrderId, OrderStatus, Page, PaymentStatus};
use buildmart_shop::models::{ManualOrderInput, Order, OrderDetail, OrderFilter, OrderSummary};
use buildmart_shop::services::OrderService;

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list).post(create))
        .route("/orders/{id}", get(show).delete(delete))
        .route("/orders/{id}/status", post(update_status))
        .route("/orders/{id}/payment-status", post(update_payment_status))
        .route("/orders/{id}/notes", post(update_notes))
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct PaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

fn service(state: &AppState) -> OrderService<'_> {
    OrderService::new(state.pool(), state.events(), state.mailer())
}

// =============================================================================
// Handlers
// =============================================================================

#[instrument(skip_all, fields(status = ?filter.status, q = ?filter.q))]
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiQuery(filter): ApiQuery<OrderFilter>,
) -> Result<Json<ActionResult<Page<OrderSummary>>>> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from > to
    {
        return Err(AppError::BadRequest(
            "Start date cannot be after end date".to_string(),
        ));
    }
    let orders = service(&state).list(&filter).await?;
    Ok(Json(ActionResult::ok(orders)))
}

pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<ActionResult<OrderDetail>>> {
    let detail = service(&state).get(id).await?;
    Ok(Json(ActionResult::ok(detail)))
}

/// Create a manual order. Stock is taken exactly as for a storefront order.
#[instrument(skip_all, fields(staff_id = %staff.id, items = input.items.len()))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiJson(input): ApiJson<ManualOrderInput>,
) -> Result<Json<ActionResult<OrderDetail>>> {
    let detail = service(&state)
        .create_manual(input, &state.config().delivery)
        .await?;
    Ok(Json(ActionResult::ok(detail)))
}

/// Move an order along the status workflow. Cancelling restores stock.
#[instrument(skip_all, fields(staff_id = %staff.id, order_id = %id, status = %req.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<Json<ActionResult<Order>>> {
    let order = service(&state).update_status(id, req.status).await?;
    Ok(Json(ActionResult::ok(order)))
}

#[instrument(skip_all, fields(staff_id = %staff.id, order_id = %id))]
pub async fn update_payment_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(req): ApiJson<PaymentStatusRequest>,
) -> Result<Json<ActionResult<Order>>> {
    let order = service(&state)
        .update_payment_status(id, req.payment_status)
        .await?;
    Ok(Json(ActionResult::ok(order)))
}

pub async fn update_notes(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(req): ApiJson<NotesRequest>,
) -> Result<Json<ActionResult<Order>>> {
    let order = service(&state)
        .update_notes(id, req.notes.as_deref())
        .await?;
    Ok(Json(ActionResult::ok(order)))
}

/// Delete a pending or cancelled order.
#[instrument(skip_all, fields(staff_id = %staff.id, order_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<ActionResult<()>>> {
    service(&state).delete(id).await?;
    Ok(Json(ActionResult::done()))
}
