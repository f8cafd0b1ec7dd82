//! Public catalog route handlers.
//!
//! All reads go through the [`CatalogCache`](crate::cache::CatalogCache) and
//! only ever show active products.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use buildmart_core::{ActionResult, CategoryId, Page};
use buildmart_shop::models::{
    Category, CategorySummary, ProductDetail, ProductFilter, ProductType,
};

use crate::error::{AppError, Result};
use crate::extract::{ApiPath, ApiQuery};
use crate::state::AppState;

/// Build the catalog router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/{slug}", get(show_category))
        .route("/product-types", get(list_product_types))
        .route("/products", get(list_products))
        .route("/products/{slug}", get(show_product))
        .route("/products/{slug}/related", get(related_products))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductTypeQuery {
    pub category_id: Option<CategoryId>,
    /// Category slug, used when `category_id` is absent.
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: Category,
    pub product_types: Vec<ProductType>,
}

/// Look up an active product by slug or fail with 404.
pub(crate) async fn find_product(state: &AppState, slug: &str) -> Result<ProductDetail> {
    state
        .cache()
        .product(state.pool(), slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// Categories with product counts.
#[instrument(skip_all)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ActionResult<Vec<CategorySummary>>>> {
    let categories = state.cache().categories(state.pool()).await?;
    Ok(Json(ActionResult::ok(categories)))
}

/// A category and its product types.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn show_category(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<ActionResult<CategoryView>>> {
    let category = state
        .cache()
        .category(state.pool(), &slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
    let product_types = state
        .cache()
        .product_types(state.pool(), Some(category.id))
        .await?;
    Ok(Json(ActionResult::ok(CategoryView {
        category,
        product_types,
    })))
}

/// Product types, optionally for one category.
#[instrument(skip_all)]
pub async fn list_product_types(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductTypeQuery>,
) -> Result<Json<ActionResult<Vec<ProductType>>>> {
    let category_id = match (query.category_id, query.category.as_deref()) {
        (Some(id), _) => Some(id),
        (None, Some(slug)) => Some(
            state
                .cache()
                .category(state.pool(), slug)
                .await?
                .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?
                .id,
        ),
        (None, None) => None,
    };
    let types = state
        .cache()
        .product_types(state.pool(), category_id)
        .await?;
    Ok(Json(ActionResult::ok(types)))
}

/// Search, filter, sort, and paginate active products.
#[instrument(skip_all, fields(q = ?filter.q))]
pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(mut filter): ApiQuery<ProductFilter>,
) -> Result<Json<ActionResult<Page<ProductDetail>>>> {
    filter.include_inactive = false;
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price)
        && min > max
    {
        return Err(AppError::BadRequest(
            "Minimum price cannot exceed maximum price".to_string(),
        ));
    }
    let page = state.cache().products(state.pool(), &filter).await?;
    Ok(Json(ActionResult::ok(page)))
}

/// Product page data.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn show_product(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<ActionResult<ProductDetail>>> {
    let product = find_product(&state, &slug).await?;
    Ok(Json(ActionResult::ok(product)))
}

/// Up to four other products from the same category.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn related_products(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<ActionResult<Vec<ProductDetail>>>> {
    let product = find_product(&state, &slug).await?;
    let related = state.cache().related(state.pool(), &product).await?;
    Ok(Json(ActionResult::ok(related)))
}
