//! Product type management.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use serde::Deserialize;

use buildmart_core::{ActionResult, CategoryId, ProductTypeId};
use buildmart_shop::db::ProductTypeRepository;
use buildmart_shop::models::{ProductType, ProductTypeInput};
use buildmart_shop::services::CatalogService;

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// Build the product types router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/product-types", get(list).post(create))
        .route("/product-types/{id}", put(update).delete(delete))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductTypeQuery {
    pub category_id: Option<CategoryId>,
}

pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiQuery(query): ApiQuery<ProductTypeQuery>,
) -> Result<Json<ActionResult<Vec<ProductType>>>> {
    let types = ProductTypeRepository::new(state.pool())
        .list(query.category_id)
        .await?;
    Ok(Json(ActionResult::ok(types)))
}

pub async fn create(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiJson(input): ApiJson<ProductTypeInput>,
) -> Result<Json<ActionResult<ProductType>>> {
    let product_type = CatalogService::new(state.pool(), state.events())
        .create_product_type(input)
        .await?;
    Ok(Json(ActionResult::ok(product_type)))
}

pub async fn update(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiPath(id): ApiPath<ProductTypeId>,
    ApiJson(input): ApiJson<ProductTypeInput>,
) -> Result<Json<ActionResult<ProductType>>> {
    let product_type = CatalogService::new(state.pool(), state.events())
        .update_product_type(id, input)
        .await?;
    Ok(Json(ActionResult::ok(product_type)))
}

/// Delete a product type. Products that used it keep their category.
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiPath(id): ApiPath<ProductTypeId>,
) -> Result<Json<ActionResult<()>>> {
    CatalogService::new(state.pool(), state.events())
        .delete_product_type(id)
        .await?;
    Ok(Json(ActionResult::done()))
}
