//! Review moderation.

use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post},
};
use serde::Deserialize;
use tracing::instrument;

use buildmart_core::{ActionResult, Page, ReviewId};
use buildmart_shop::db::ReviewRepository;
use buildmart_shop::models::{Review, ReviewFilter};
use buildmart_shop::services::ReviewService;

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// Build the reviews router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(list))
        .route("/reviews/{id}/approval", post(set_approval))
        .route("/reviews/{id}", delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub approved: bool,
}

/// Reviews filtered by approval, product, and rating; newest first.
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    ApiQuery(filter): ApiQuery<ReviewFilter>,
) -> Result<Json<ActionResult<Page<Review>>>> {
    let reviews = ReviewRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(ActionResult::ok(reviews)))
}

#[instrument(skip_all, fields(staff_id = %staff.id, review_id = %id, approved = req.approved))]
pub async fn set_approval(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiPath(id): ApiPath<ReviewId>,
    ApiJson(req): ApiJson<ApprovalRequest>,
) -> Result<Json<ActionResult<Review>>> {
    let review = ReviewService::new(state.pool(), state.events())
        .set_approval(id, req.approved)
        .await?;
    Ok(Json(ActionResult::ok(review)))
}

#[instrument(skip_all, fields(staff_id = %staff.id, review_id = %id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ApiPath(id): ApiPath<ReviewId>,
) -> Result<Json<ActionResult<()>>> {
    ReviewService::new(state.pool(), state.events())
        .delete(id)
        .await?;
    Ok(Json(ActionResult::done()))
}
