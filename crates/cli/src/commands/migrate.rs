//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! gl-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `GAMELINK_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use gamelink_server::config::{ConfigError, get_database_url};
use gamelink_server::db;
use thiserror::Error;

/// Errors raised while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Connection string missing from the environment.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Could not connect to the database.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply all pending migrations from `crates/server/migrations`.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the database is
/// unreachable, or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = get_database_url("GAMELINK_DATABASE_URL")?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    pool.close().await;
    tracing::info!("Migrations complete!");
    Ok(())
}
