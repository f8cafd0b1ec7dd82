//! HTTP middleware for the admin API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. Session layer (tower-sessions with `PostgreSQL` store)
//! 3. `TraceLayer` (request tracing)

pub mod auth;
pub mod session;

pub use auth::{RequireAdmin, RequireStaff, clear_current_staff, set_current_staff};
pub use session::{create_session_layer, create_session_store};
