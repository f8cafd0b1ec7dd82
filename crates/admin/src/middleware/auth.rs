//! Authentication extractors for admin.
//!
//! Every admin route except login requires a staff session. Customer
//! management additionally requires the `admin` role.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use buildmart_core::UserRole;

use crate::error::AppError;
use crate::models::{CurrentStaff, session_keys};

async fn current_staff(parts: &Parts) -> Result<CurrentStaff, AppError> {
    // Get the session from extensions (set by SessionManagerLayer)
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

    let staff: CurrentStaff = session
        .get(session_keys::CURRENT_STAFF)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Please sign in".to_string()))?;

    if !staff.role.is_staff() {
        return Err(AppError::Forbidden("Staff access required".to_string()));
    }
    Ok(staff)
}

/// Extractor that requires a signed-in staff member or admin.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireStaff(staff): RequireStaff,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", staff.name)
/// }
/// ```
pub struct RequireStaff(pub CurrentStaff);

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_staff(parts).await?))
    }
}

/// Extractor that requires the `admin` role.
///
/// Not signed in is 401; signed in as plain staff is 403.
pub struct RequireAdmin(pub CurrentStaff);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let staff = current_staff(parts).await?;
        if staff.role != UserRole::Admin {
            return Err(AppError::Forbidden(
                "Only admins can access this resource".to_string(),
            ));
        }
        Ok(Self(staff))
    }
}

/// Helper to set the current staff member in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_staff(
    session: &Session,
    staff: &CurrentStaff,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_STAFF, staff).await
}

/// Helper to end the staff session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_staff(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
