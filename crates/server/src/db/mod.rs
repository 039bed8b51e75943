//! Database operations for the GameLink `PostgreSQL` database.
//!
//! # Schema: `gamelink`
//!
//! Stores local data only (the game store is the source of truth for game
//! accounts, characters and goods):
//!
//! ## Tables
//!
//! - `users` - Identity ledger: balance, role, game link, Discord link
//! - `verification_token` - Single-use Discord verification tokens
//! - `catalog_item` / `catalog_item_content` - Shop items and their goods
//! - `purchase` - Append-only purchase audit
//! - `voucher` / `voucher_content` - Vouchers and their goods
//! - `voucher_redemption` - Redemptions, unique per `(user_id, voucher_id)`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p gamelink-cli -- migrate
//! ```

pub mod catalog;
pub mod users;
pub mod verification;
pub mod vouchers;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use catalog::PgCatalogRepository;
pub use users::PgUserRepository;
pub use verification::PgVerificationRepository;
pub use vouchers::PgVoucherRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique token).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-violation into `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(what.to_owned());
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
