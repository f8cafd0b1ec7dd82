//! Storefront-only models: session identity and the session cart.
//!
//! Domain records live in [`buildmart_shop::models`].

pub mod cart;
pub mod session;

pub use cart::{CartItem, CartLine, CartView, SessionCart};
pub use session::{CurrentUser, keys as session_keys};
