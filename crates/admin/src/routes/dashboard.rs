//! Dashboard statistics.

use axum::{Json, Router, extract::State, routing::get};
use tracing::instrument;

use buildmart_core::ActionResult;
use buildmart_shop::db::DashboardRepository;
use buildmart_shop::models::DashboardStats;

use crate::error::Result;
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(stats))
}

#[instrument(skip_all)]
pub async fn stats(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
) -> Result<Json<ActionResult<DashboardStats>>> {
    let stats = DashboardRepository::new(state.pool())
        .stats(state.config().low_stock_threshold)
        .await?;
    Ok(Json(ActionResult::ok(stats)))
}
