//! Staff authentication route handlers.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use buildmart_core::ActionResult;
use buildmart_shop::models::User;
use buildmart_shop::services::AuthService;

use crate::error::Result;
use crate::extract::ApiJson;
use crate::middleware::{RequireStaff, clear_current_staff, set_current_staff};
use crate::models::CurrentStaff;
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Sign in. Customer accounts are refused with 403.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<ActionResult<CurrentStaff>>> {
    let user = AuthService::new(state.pool(), state.mailer())
        .login_staff(&req.email, &req.password)
        .await?;

    let staff = CurrentStaff::from(&user);
    set_current_staff(&session, &staff).await?;
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user.id.to_string()),
            email: Some(user.email.to_string()),
            ..Default::default()
        }));
    });
    tracing::info!(user_id = %user.id, role = %user.role, "staff signed in");

    Ok(Json(ActionResult::ok(staff)))
}

pub async fn logout(session: Session) -> Result<Json<ActionResult<()>>> {
    clear_current_staff(&session).await?;
    sentry::configure_scope(|scope| scope.set_user(None));
    Ok(Json(ActionResult::done()))
}

/// The signed-in staff member, fresh from the database.
pub async fn me(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
) -> Result<Json<ActionResult<User>>> {
    let user = AuthService::new(state.pool(), state.mailer())
        .get_user(staff.id)
        .await?;
    Ok(Json(ActionResult::ok(user)))
}
