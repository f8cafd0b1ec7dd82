//! Session-related types for staff authentication.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use buildmart_core::{Email, UserId, UserRole};
use buildmart_shop::models::User;

/// Session-stored staff identity.
///
/// Minimal data stored in the session to identify the logged-in staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentStaff {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// `Staff` or `Admin`.
    pub role: UserRole,
}

impl From<&User> for CurrentStaff {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Session keys for staff authentication data.
pub mod keys {
    /// Key for storing the current logged-in staff member.
    pub const CURRENT_STAFF: &str = "current_staff";
}
