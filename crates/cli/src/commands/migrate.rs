//! Database migration command.
//!
//! Applies the embedded `shop` schema migrations, then creates the session
//! tables for both web apps (`shop.storefront_session`, `shop.admin_session`).

use sqlx::PgPool;

/// Run all migrations.
///
/// # Errors
///
/// Returns an error if a migration or session table creation fails.
pub async fn run(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Running shop migrations...");
    buildmart_shop::MIGRATOR.run(pool).await?;

    tracing::info!("Creating storefront session table...");
    buildmart_storefront::middleware::session::create_session_store(pool)
        .migrate()
        .await?;

    tracing::info!("Creating admin session table...");
    buildmart_admin::middleware::session::create_session_store(pool)
        .migrate()
        .await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
