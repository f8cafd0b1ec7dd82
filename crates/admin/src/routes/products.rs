//! Product management.
//!
//! Unlike the storefront, listings include inactive products. Every write
//! goes through [`CatalogService`], which publishes a catalog event so the
//! storefront cache is cleared.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use buildmart_core::{ActionResult, Page, ProductId};
use buildmart_shop::db::ProductRepository;
use buildmart_shop::models::{Product, ProductDetail, ProductFilter, ProductInput};
use buildmart_shop::services::CatalogService;

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list).post(create))
        .route("/products/{id}", get(show).put(update).delete(delete))
        .route("/products/{id}/active", post(set_active))
        .route("/products/{id}/stock", post(adjust_stock))
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    /// Units to add (positive) or remove (negative).
    pub delta: i32,
}

fn service(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.pool(), state.events())
}

#[instrument(skip_all, fields(q = ?filter.q))]
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiQuery(mut filter): ApiQuery<ProductFilter>,
) -> Result<Json<ActionResult<Page<ProductDetail>>>> {
    filter.include_inactive = true;
    let page = ProductRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(ActionResult::ok(page)))
}

pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ActionResult<ProductDetail>>> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    Ok(Json(ActionResult::ok(product)))
}

#[instrument(skip_all, fields(staff_id = %staff.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<Json<ActionResult<Product>>> {
    let product = service(&state).create_product(input).await?;
    Ok(Json(ActionResult::ok(product)))
}

#[instrument(skip_all, fields(staff_id = %staff.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<Json<ActionResult<Product>>> {
    let product = service(&state).update_product(id, input).await?;
    Ok(Json(ActionResult::ok(product)))
}

/// Delete a product. Products on existing orders can't be deleted;
/// deactivate them instead.
#[instrument(skip_all, fields(staff_id = %staff.id, product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ActionResult<()>>> {
    service(&state).delete_product(id).await?;
    Ok(Json(ActionResult::done()))
}

#[instrument(skip_all, fields(staff_id = %staff.id, product_id = %id, active = req.active))]
pub async fn set_active(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(req): ApiJson<SetActiveRequest>,
) -> Result<Json<ActionResult<Product>>> {
    let product = service(&state).set_product_active(id, req.active).await?;
    Ok(Json(ActionResult::ok(product)))
}

/// Add or remove stock. Stock can't go below zero.
#[instrument(skip_all, fields(staff_id = %staff.id, product_id = %id, delta = req.delta))]
pub async fn adjust_stock(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(req): ApiJson<AdjustStockRequest>,
) -> Result<Json<ActionResult<Product>>> {
    let product = service(&state).adjust_stock(id, req.delta).await?;
    Ok(Json(ActionResult::ok(product)))
}
