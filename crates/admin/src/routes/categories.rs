//! Category management.

use axum::{Json, Router, extract::State, routing::get};

use buildmart_core::{ActionResult, CategoryId};
use buildmart_shop::db::CategoryRepository;
use buildmart_shop::models::{Category, CategoryInput, CategorySummary};
use buildmart_shop::services::CatalogService;

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// Build the categories router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/{id}", get(show).put(update).delete(delete))
}

/// All categories, counting inactive products too.
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
) -> Result<Json<ActionResult<Vec<CategorySummary>>>> {
    let categories = CategoryRepository::new(state.pool()).list(false).await?;
    Ok(Json(ActionResult::ok(categories)))
}

pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<Json<ActionResult<Category>>> {
    let category = CategoryRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
    Ok(Json(ActionResult::ok(category)))
}

pub async fn create(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<Json<ActionResult<Category>>> {
    let category = CatalogService::new(state.pool(), state.events())
        .create_category(input)
        .await?;
    Ok(Json(ActionResult::ok(category)))
}

pub async fn update(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiPath(id): ApiPath<CategoryId>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<Json<ActionResult<Category>>> {
    let category = CatalogService::new(state.pool(), state.events())
        .update_category(id, input)
        .await?;
    Ok(Json(ActionResult::ok(category)))
}

/// Delete an empty category. Categories that still hold products are a
/// 409 conflict.
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<Json<ActionResult<()>>> {
    CatalogService::new(state.pool(), state.events())
        .delete_category(id)
        .await?;
    Ok(Json(ActionResult::done()))
}
