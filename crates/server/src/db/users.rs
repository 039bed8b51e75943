//! User repository for database operations.
//!
//! This module provides database access for the identity ledger: balances,
//! game links and Discord links. Every mutation that guards an invariant is a
//! single conditional statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use gamelink_core::{CatalogItemId, Coins, GameAccountId, PurchaseId, Role, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{
    ApiKey, DiscordIdentity, GameLink, LinkedAccount, PurchaseOrder, PurchaseRecord, User,
};
use crate::store::{PurchaseOutcome, UserStore};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    role: Role,
    balance: i64,
    game_account_id: Option<i32>,
    game_api_key: Option<String>,
    discord_id: Option<String>,
    discord_username: Option<String>,
    profile_image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let balance = Coins::new(row.balance).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid balance in database: {e}"))
        })?;

        let game = match (row.game_account_id, row.game_api_key) {
            (Some(account_id), Some(api_key)) => Some(LinkedAccount {
                account_id: GameAccountId::new(account_id),
                api_key: ApiKey::from_stored(api_key),
            }),
            (None, None) => None,
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "user {} has a partial game link",
                    row.id
                )));
            }
        };

        let discord = match (row.discord_id, row.discord_username) {
            (Some(discord_id), Some(discord_username)) => Some(DiscordIdentity {
                discord_id,
                discord_username,
            }),
            _ => None,
        };

        Ok(Self {
            id: UserId::new(row.id),
            username: row.username,
            email: row.email,
            role: row.role,
            balance,
            game,
            discord,
            profile_image: row.profile_image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Internal row type for purchase audit queries.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: i32,
    user_id: Uuid,
    item_id: i32,
    quantity: i32,
    cost: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<PurchaseRow> for PurchaseRecord {
    type Error = RepositoryError;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        let cost = Coins::new(row.cost).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid purchase cost in database: {e}"))
        })?;

        Ok(Self {
            id: PurchaseId::new(row.id),
            user_id: UserId::new(row.user_id),
            item_id: CatalogItemId::new(row.item_id),
            quantity: row.quantity,
            cost,
            created_at: row.created_at,
        })
    }
}

const USER_COLUMNS: &str = r"
    id, username, email, role, balance,
    game_account_id, game_api_key,
    discord_id, discord_username,
    profile_image, created_at, updated_at
";

// =============================================================================
// Shared statements
// =============================================================================

/// Write a game link onto a user that has none.
///
/// Returns `false` when no row matched, i.e. the user is missing or already
/// linked. Used both standalone and inside the token-consuming transaction.
pub(crate) async fn write_link(
    conn: &mut PgConnection,
    id: UserId,
    link: &GameLink,
) -> Result<bool, RepositoryError> {
    let (discord_id, discord_username) = link
        .discord
        .as_ref()
        .map(|d| (d.discord_id.as_str(), d.discord_username.as_str()))
        .unzip();

    let result = sqlx::query(
        r"
        UPDATE gamelink.users
        SET game_account_id = $2,
            game_api_key = $3,
            discord_id = COALESCE($4, discord_id),
            discord_username = COALESCE($5, discord_username),
            updated_at = NOW()
        WHERE id = $1 AND game_account_id IS NULL
        ",
    )
    .bind(id.as_uuid())
    .bind(link.account.account_id.as_i32())
    .bind(link.account.api_key.expose())
    .bind(discord_id)
    .bind(discord_username)
    .execute(conn)
    .await
    .map_err(|e| conflict_on_unique(e, "game account already linked to another user"))?;

    Ok(result.rows_affected() == 1)
}

async fn user_exists(conn: &mut PgConnection, id: UserId) -> Result<bool, RepositoryError> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM gamelink.users WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(conn)
            .await?;
    Ok(exists)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM gamelink.users WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM gamelink.users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn link_game_account(&self, id: UserId, link: &GameLink) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        if write_link(&mut conn, id, link).await? {
            return Ok(());
        }

        if user_exists(&mut conn, id).await? {
            Err(RepositoryError::Conflict("user already linked".to_owned()))
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    async fn purchase(
        &self,
        id: UserId,
        order: &PurchaseOrder,
    ) -> Result<PurchaseOutcome, RepositoryError> {
        let quantity = i32::try_from(order.quantity).map_err(|_| {
            RepositoryError::Conflict(format!("quantity {} out of range", order.quantity))
        })?;

        let mut tx = self.pool.begin().await?;

        let balance: Option<(i64,)> = sqlx::query_as(
            r"
            UPDATE gamelink.users
            SET balance = balance - $2, updated_at = NOW()
            WHERE id = $1 AND balance >= $2
            RETURNING balance
            ",
        )
        .bind(id.as_uuid())
        .bind(order.cost.amount())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((balance,)) = balance else {
            let exists = user_exists(&mut *tx, id).await?;
            tx.rollback().await?;
            return if exists {
                Ok(PurchaseOutcome::InsufficientBalance)
            } else {
                Err(RepositoryError::NotFound)
            };
        };

        let row = sqlx::query_as::<_, PurchaseRow>(
            r"
            INSERT INTO gamelink.purchase (user_id, item_id, quantity, cost)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, item_id, quantity, cost, created_at
            ",
        )
        .bind(id.as_uuid())
        .bind(order.item_id.as_i32())
        .bind(quantity)
        .bind(order.cost.amount())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let new_balance = Coins::new(balance).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid balance after purchase: {e}"))
        })?;

        Ok(PurchaseOutcome::Completed {
            new_balance,
            record: row.try_into()?,
        })
    }

    async fn purchases(&self, id: UserId) -> Result<Vec<PurchaseRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, PurchaseRow>(
            r"
            SELECT id, user_id, item_id, quantity, cost, created_at
            FROM gamelink.purchase
            WHERE user_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn credit(&self, id: UserId, amount: Coins) -> Result<Coins, RepositoryError> {
        let balance: Option<(i64,)> = sqlx::query_as(
            r"
            UPDATE gamelink.users
            SET balance = balance + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING balance
            ",
        )
        .bind(id.as_uuid())
        .bind(amount.amount())
        .fetch_optional(&self.pool)
        .await?;

        let (balance,) = balance.ok_or(RepositoryError::NotFound)?;
        Coins::new(balance).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid balance after credit: {e}"))
        })
    }

    async fn update_profile_image(
        &self,
        id: UserId,
        profile_image: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE gamelink.users
            SET profile_image = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .bind(profile_image)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn update_role(&self, id: UserId, role: Role) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE gamelink.users
            SET role = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .bind(role)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row() -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            username: "player".to_string(),
            email: "player@example.com".to_string(),
            role: Role::User,
            balance: 100,
            game_account_id: None,
            game_api_key: None,
            discord_id: None,
            discord_username: None,
            profile_image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unlinked_row_converts() {
        let user = User::try_from(row()).unwrap();
        assert!(!user.is_linked());
        assert_eq!(user.balance.amount(), 100);
    }

    #[test]
    fn test_linked_row_converts() {
        let mut r = row();
        r.game_account_id = Some(42);
        r.game_api_key = Some("key".to_string());
        let user = User::try_from(r).unwrap();
        let creds = user.game_credentials().unwrap();
        assert_eq!(creds.game_account_id, GameAccountId::new(42));
        assert_eq!(creds.api_key.expose(), "key");
    }

    #[test]
    fn test_partial_link_is_corruption() {
        let mut r = row();
        r.game_account_id = Some(42);
        assert!(matches!(
            User::try_from(r),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_negative_balance_is_corruption() {
        let mut r = row();
        r.balance = -1;
        assert!(matches!(
            User::try_from(r),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
