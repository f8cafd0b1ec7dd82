//! Product review route handlers.
//!
//! Anyone can read approved reviews; writing requires a signed-in customer,
//! and customers may only edit or delete their own reviews.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, patch},
};
use tracing::instrument;

use buildmart_core::{ActionResult, Page, Pagination, ReviewId};
use buildmart_shop::db::ReviewRepository;
use buildmart_shop::models::{Review, ReviewInput};
use buildmart_shop::services::ReviewService;

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireAuth;
use crate::routes::catalog::find_product;
use crate::state::AppState;

/// Build the reviews router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/products/{slug}/reviews",
            get(list_for_product).post(create),
        )
        .route("/reviews/{id}", patch(update).delete(delete))
}

/// Approved reviews for a product, newest first.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn list_for_product(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ActionResult<Page<Review>>>> {
    let product = find_product(&state, &slug).await?;
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(product.product.id, pagination.clamped())
        .await?;
    Ok(Json(ActionResult::ok(reviews)))
}

/// Review a product. One review per customer and product.
#[instrument(skip_all, fields(slug = %slug, user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(slug): ApiPath<String>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> Result<Json<ActionResult<Review>>> {
    let product = find_product(&state, &slug).await?;
    let review = ReviewService::new(state.pool(), state.events())
        .create(
            product.product.id,
            user.id,
            input,
            state.config().reviews_auto_approve,
        )
        .await?;
    Ok(Json(ActionResult::ok(review)))
}

/// Edit one of the customer's own reviews.
#[instrument(skip_all, fields(review_id = %id, user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ReviewId>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> Result<Json<ActionResult<Review>>> {
    let review = ReviewService::new(state.pool(), state.events())
        .update_own(id, user.id, input, state.config().reviews_auto_approve)
        .await?;
    Ok(Json(ActionResult::ok(review)))
}

/// Delete one of the customer's own reviews.
#[instrument(skip_all, fields(review_id = %id, user_id = %user.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ReviewId>,
) -> Result<Json<ActionResult<()>>> {
    ReviewService::new(state.pool(), state.events())
        .delete_own(id, user.id)
        .await?;
    Ok(Json(ActionResult::done()))
}
