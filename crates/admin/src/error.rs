//! Unified error handling for admin.
//!
//! Every error response is `{"success": false, "error": "<message>"}`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use buildmart_core::ActionResult;
use buildmart_shop::db::RepositoryError;
use buildmart_shop::services::{AuthError, ServiceError};

/// Application-level error type for the admin API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// A shop service rejected the request or failed.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Staff login or account operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(e)
            | Self::Service(ServiceError::Repository(e))
            | Self::Auth(AuthError::Repository(e)) => repository_status(e),
            Self::Service(ServiceError::Validation(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Service(ServiceError::Rejected(_)) => StatusCode::CONFLICT,
            Self::Auth(AuthError::InvalidCredentials | AuthError::UserNotFound)
            | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::NotStaff) | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Auth(AuthError::UserAlreadyExists) => StatusCode::CONFLICT,
            Self::Auth(
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) | AuthError::Validation(_),
            ) => StatusCode::BAD_REQUEST,
            Self::Auth(AuthError::PasswordHash) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Client-safe message. Internal details are never exposed.
    fn message(&self, status: StatusCode) -> String {
        if status.is_server_error() {
            return "Internal server error".to_string();
        }
        match self {
            Self::Database(e)
            | Self::Service(ServiceError::Repository(e))
            | Self::Auth(AuthError::Repository(e)) => match e {
                RepositoryError::Conflict(msg) => msg.clone(),
                _ => "Not found".to_string(),
            },
            Self::Service(ServiceError::Validation(e)) => e.to_string(),
            Self::Service(ServiceError::Rejected(msg))
            | Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg) => msg.clone(),
            Self::Auth(AuthError::InvalidCredentials | AuthError::UserNotFound) => {
                "Invalid credentials".to_string()
            }
            Self::Auth(AuthError::NotStaff) => "Access denied".to_string(),
            Self::Auth(e) => e.to_string(),
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        let message = self.message(status);
        (status, Json(ActionResult::<()>::err(message))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use buildmart_shop::models::ValidationError;

    async fn parts(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_forbidden() {
        let (status, body) = parts(AppError::Forbidden("Admins only".to_string())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Admins only");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_not_staff_is_forbidden() {
        let (status, body) = parts(AuthError::NotStaff.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Access denied");
    }

    #[tokio::test]
    async fn test_conflicts_keep_their_message() {
        let err = ServiceError::Repository(RepositoryError::Conflict(
            "Category still has products".to_string(),
        ));
        let (status, body) = parts(err.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Category still has products");
    }

    #[tokio::test]
    async fn test_validation_is_bad_request() {
        let err = ServiceError::Validation(ValidationError::new("Price must be positive"));
        let (status, body) = parts(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Price must be positive");
    }

    #[tokio::test]
    async fn test_database_errors_are_hidden() {
        let err = RepositoryError::DataCorruption("bad row".to_string());
        let (status, body) = parts(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }
}
