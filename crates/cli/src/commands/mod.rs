//! Subcommand implementations.

pub mod migrate;
pub mod seed;
pub mod staff;

use sqlx::PgPool;

use buildmart_shop::config::{get_database_url, load_dotenv};
use buildmart_shop::db::create_pool;

/// Connect to the shop database named by `ADMIN_DATABASE_URL`
/// (or `DATABASE_URL`).
///
/// # Errors
///
/// Returns an error if the URL is unset or the connection fails.
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    load_dotenv();
    let database_url = get_database_url("ADMIN_DATABASE_URL")?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(&database_url).await?;
    Ok(pool)
}
