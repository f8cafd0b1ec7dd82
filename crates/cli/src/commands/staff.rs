//! Staff account management.

use sqlx::PgPool;
use thiserror::Error;

use buildmart_core::UserRole;
use buildmart_shop::email::Mailer;
use buildmart_shop::services::{AuthError, AuthService};

/// Errors that can occur while creating a staff account.
#[derive(Debug, Error)]
pub enum StaffError {
    /// Customers register through the storefront.
    #[error("Invalid role: {0}. Valid roles: staff, admin")]
    InvalidRole(UserRole),

    /// Account creation failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Check that `role` may be granted from the command line.
const fn check_role(role: UserRole) -> Result<(), StaffError> {
    if role.is_staff() {
        Ok(())
    } else {
        Err(StaffError::InvalidRole(role))
    }
}

/// Create a staff or admin account.
///
/// # Errors
///
/// Returns `StaffError::InvalidRole` for the customer role, and
/// `StaffError::Auth` for a taken email, weak password, or database failure.
pub async fn create(
    pool: &PgPool,
    email: &str,
    name: &str,
    password: &str,
    role: UserRole,
) -> Result<(), StaffError> {
    check_role(role)?;

    let mailer = Mailer::disabled("http://localhost");
    let user = AuthService::new(pool, &mailer)
        .create_staff(email, password, name, role)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, %role, "Staff account created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_role() {
        assert!(check_role(UserRole::Staff).is_ok());
        assert!(check_role(UserRole::Admin).is_ok());
        assert!(matches!(
            check_role(UserRole::Customer),
            Err(StaffError::InvalidRole(UserRole::Customer))
        ));
    }

    #[test]
    fn test_invalid_role_message() {
        let err = StaffError::InvalidRole(UserRole::Customer);
        assert_eq!(err.to_string(), "Invalid role: customer. Valid roles: staff, admin");
    }
}
