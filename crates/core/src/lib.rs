//! BuildMart Core - Shared types library.
//!
//! This crate provides common types used across all BuildMart components:
//! - `shop` - Persistence, chat fan-out, and transactional email
//! - `storefront` - Public-facing catalog, cart, and checkout API
//! - `admin` - Staff dashboard API
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere, including the integration test crate.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, money, emails, statuses, and pricing rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
