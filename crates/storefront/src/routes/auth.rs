//! Authentication route handlers.
//!
//! Registration and login put a [`CurrentUser`] in the session; logout takes
//! it out again. Both write routes sit behind the auth rate limiter.

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use buildmart_core::ActionResult;
use buildmart_shop::models::User;
use buildmart_shop::services::AuthService;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::extract::ApiJson;
use crate::middleware::{auth_rate_limiter, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Build the auth router. Register and login are rate limited per client.
pub fn router(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .layer(auth_rate_limiter(trust_proxy_headers))
        .route("/auth/logout", post(logout))
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// =============================================================================
// Handlers
// =============================================================================

async fn sign_in(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &CurrentUser::from(user)).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Create a customer account and sign it in.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<Json<ActionResult<User>>> {
    let user = AuthService::new(state.pool(), state.mailer())
        .register(&req.email, &req.password, &req.name)
        .await?;
    sign_in(&session, &user).await?;

    tracing::info!(user_id = %user.id, "Customer registered");
    Ok(Json(ActionResult::ok(user)))
}

/// Sign in with email and password.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<ActionResult<User>>> {
    let user = AuthService::new(state.pool(), state.mailer())
        .login(&req.email, &req.password)
        .await?;
    sign_in(&session, &user).await?;

    tracing::info!(user_id = %user.id, "Customer logged in");
    Ok(Json(ActionResult::ok(user)))
}

/// Sign out. The session cart is kept.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Json<ActionResult<()>>> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(Json(ActionResult::done()))
}
