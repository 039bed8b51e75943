//! Direct access to the game store's `MySQL` databases.
//!
//! Accounts and goods live in the account database, characters in the
//! character database. Mutations go through the game store's stored
//! procedures so its own invariants stay enforced.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

use gamelink_core::{CharacterNo, GameAccountId, GoodsId};

use super::{Character, GameGateway, GatewayError};
use crate::config::SqlGatewayConfig;

/// Web storage slot the shop delivers into.
const WEB_STORAGE_SLOT: i32 = 0;

/// Return code of a successful stored procedure.
const PROCEDURE_OK: i32 = 1;

#[derive(Debug, sqlx::FromRow)]
struct CharacterRow {
    #[sqlx(rename = "nCharNo")]
    char_no: i32,
    #[sqlx(rename = "sID")]
    name: String,
    #[sqlx(rename = "nLevel")]
    level: i32,
    #[sqlx(rename = "nPlayTime")]
    playtime: i32,
    #[sqlx(rename = "nMoney")]
    money: i64,
    #[sqlx(rename = "nClass")]
    class_id: i32,
}

impl From<CharacterRow> for Character {
    fn from(row: CharacterRow) -> Self {
        Self {
            char_no: CharacterNo::new(row.char_no),
            name: row.name,
            level: row.level,
            playtime: row.playtime,
            money: row.money,
            class_id: row.class_id,
        }
    }
}

/// Game gateway backed by the game store's databases.
#[derive(Clone)]
pub struct SqlGameGateway {
    accounts: MySqlPool,
    characters: MySqlPool,
}

impl SqlGameGateway {
    /// Connect to the account and character databases.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Database` if either connection cannot be established.
    pub async fn connect(config: &SqlGatewayConfig) -> Result<Self, GatewayError> {
        let options = MySqlPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(config.timeout);

        let accounts = options
            .clone()
            .connect(config.account_db_url.expose_secret())
            .await?;
        let characters = options
            .connect(config.character_db_url.expose_secret())
            .await?;

        Ok(Self {
            accounts,
            characters,
        })
    }
}

#[async_trait]
impl GameGateway for SqlGameGateway {
    async fn create_account(
        &self,
        username: &str,
        credential_hash: &str,
    ) -> Result<GameAccountId, GatewayError> {
        let row: Option<(i32,)> = sqlx::query_as("CALL usp_CreateAccount(?, ?)")
            .bind(username)
            .bind(credential_hash)
            .fetch_optional(&self.accounts)
            .await?;

        let (account,) = row.ok_or_else(|| {
            GatewayError::Rejected(format!("account creation for {username} returned no id"))
        })?;
        Ok(GameAccountId::new(account))
    }

    async fn grant_goods(
        &self,
        account: GameAccountId,
        goods: GoodsId,
        quantity: i32,
    ) -> Result<(), GatewayError> {
        let (result,): (i32,) = sqlx::query_as("CALL usp_AddItemToWebStorage(?, ?, ?, ?)")
            .bind(account.as_i32())
            .bind(WEB_STORAGE_SLOT)
            .bind(goods.as_i32())
            .bind(quantity)
            .fetch_one(&self.accounts)
            .await?;

        if result != PROCEDURE_OK {
            return Err(GatewayError::Rejected(format!(
                "web storage delivery returned {result}"
            )));
        }
        Ok(())
    }

    async fn list_characters(
        &self,
        account: GameAccountId,
    ) -> Result<Vec<Character>, GatewayError> {
        let rows = sqlx::query_as::<_, CharacterRow>(
            r"
            SELECT nCharNo, sID, nLevel, nPlayTime, nMoney, nClass
            FROM tCharacter
            WHERE nUserNo = ? AND bDeleted = 0
            ORDER BY nCharNo
            ",
        )
        .bind(account.as_i32())
        .fetch_all(&self.characters)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_character(
        &self,
        account: GameAccountId,
        name: &str,
    ) -> Result<Option<Character>, GatewayError> {
        let row = sqlx::query_as::<_, CharacterRow>(
            r"
            SELECT nCharNo, sID, nLevel, nPlayTime, nMoney, nClass
            FROM tCharacter
            WHERE sID = ? AND nUserNo = ? AND bDeleted = 0
            ",
        )
        .bind(name)
        .bind(account.as_i32())
        .fetch_optional(&self.characters)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn move_to_town(&self, character: CharacterNo) -> Result<(), GatewayError> {
        sqlx::query("CALL usp_MoveCharacterToTown(?)")
            .bind(character.as_i32())
            .execute(&self.characters)
            .await?;
        Ok(())
    }
}
