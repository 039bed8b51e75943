//! Operator balance adjustments.
//!
//! Players have no way to top up from the API, so operators credit balances
//! here.

use gamelink_core::{Coins, UserId};
use gamelink_server::config::get_database_url;
use gamelink_server::db::{self, PgUserRepository};
use gamelink_server::store::UserStore;
use uuid::Uuid;

/// Add `amount` to a user's balance and print the new balance.
///
/// # Errors
///
/// Returns an error if the amount is negative, the user does not exist, or
/// the database is unreachable.
pub async fn credit(user: Uuid, amount: i64) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let amount = Coins::new(amount)?;
    let user_id = UserId::new(user);

    let database_url = get_database_url("GAMELINK_DATABASE_URL")?;
    let pool = db::create_pool(&database_url).await?;

    let balance = PgUserRepository::new(pool.clone()).credit(user_id, amount).await?;
    tracing::info!(%user_id, %amount, %balance, "Balance credited");

    pool.close().await;
    Ok(())
}
