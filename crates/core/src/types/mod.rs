//! Core types for BuildMart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod pagination;
pub mod pricing;
pub mod rating;
pub mod response;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Money, MoneyError};
pub use pagination::{Page, Pagination};
pub use pricing::{DeliveryPolicy, OrderLine, OrderTotals, PricingError};
pub use rating::{Rating, RatingError};
pub use response::ActionResult;
pub use slug::{is_valid_slug, slugify};
pub use status::*;
