//! Account route handlers for the signed-in customer.

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
use crate::middleware::{RequireAuth, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Build the account router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/account", get(show).patch(update))
        .route("/account/password", post(change_password))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// The signed-in customer's profile.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ActionResult<User>>> {
    let user = AuthService::new(state.pool(), state.mailer())
        .get_user(user.id)
        .await?;
    Ok(Json(ActionResult::ok(user)))
}

/// Update name and phone.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<ActionResult<User>>> {
    let updated = AuthService::new(state.pool(), state.mailer())
        .update_profile(user.id, &req.name, req.phone.as_deref())
        .await?;
    // Keep the session copy of the name in sync
    session
        .insert(session_keys::CURRENT_USER, CurrentUser::from(&updated))
        .await?;
    Ok(Json(ActionResult::ok(updated)))
}

/// Change the password after checking the current one.
///
/// The session id is cycled afterwards.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<Json<ActionResult<()>>> {
    AuthService::new(state.pool(), state.mailer())
        .change_password(user.id, &req.current_password, &req.new_password)
        .await?;
    set_current_user(&session, &user).await?;
    tracing::info!("Password changed");
    Ok(Json(ActionResult::done()))
}
