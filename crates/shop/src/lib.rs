//! BuildMart Shop - shared persistence and domain services.
//!
//! Both the storefront and admin binaries talk to the same `shop` schema.
//! This crate owns everything they share:
//!
//! - [`db`] - Connection pool, repositories, and `RepositoryError`
//! - [`models`] - Domain records and validated inputs
//! - [`services`] - Multi-step operations (auth, checkout, order lifecycle, chat)
//! - [`events`] - Postgres `LISTEN/NOTIFY` fan-out for chat and catalog changes
//! - [`email`] - Transactional email rendering and SMTP delivery
//! - [`config`] - Environment helpers, SMTP and Sentry settings
//! - [`telemetry`] - Sentry and tracing subscriber setup
//!
//! # Migrations
//!
//! Migrations live in `crates/shop/migrations/` and are embedded in
//! [`MIGRATOR`]. They are run explicitly via:
//! ```bash
//! cargo run -p buildmart-cli -- migrate
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod email;
pub mod events;
pub mod models;
pub mod services;
pub mod telemetry;

/// Embedded schema migrations for the `shop` schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
