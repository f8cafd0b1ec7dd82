//! Customer list and role management. Admin role only.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use buildmart_core::{ActionResult, Page, Pagination, UserId, UserRole};
use buildmart_shop::db::UserRepository;
use buildmart_shop::models::{CustomerSummary, User};

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Build the customers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list))
        .route("/customers/{id}/role", post(set_role))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CustomerQuery {
    /// Matches name or email.
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiQuery(query): ApiQuery<CustomerQuery>,
) -> Result<Json<ActionResult<Page<CustomerSummary>>>> {
    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let pagination = Pagination::new(
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(Pagination::DEFAULT_PER_PAGE),
    );
    let customers = UserRepository::new(state.pool())
        .list_customers(search, pagination)
        .await?;
    Ok(Json(ActionResult::ok(customers)))
}

/// Change a user's role. Admins can't change their own role.
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id, role = %req.role))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(req): ApiJson<RoleRequest>,
) -> Result<Json<ActionResult<User>>> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot change your own role".to_string(),
        ));
    }
    let user = UserRepository::new(state.pool())
        .set_role(id, req.role)
        .await?;
    tracing::info!(user_id = %user.id, role = %user.role, "user role changed");
    Ok(Json(ActionResult::ok(user)))
}
