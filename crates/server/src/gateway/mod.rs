//! Gateway to the external game store.
//!
//! The game store owns accounts, characters and goods. This service only
//! issues commands against it; each call is atomic on the remote side and
//! there is no transaction spanning the local ledger and the game store.
//!
//! Two implementations exist:
//!
//! - [`HttpGameGateway`] talks to a game-store API over HTTP
//! - [`SqlGameGateway`] calls the game store's stored procedures directly

mod http;
mod sql;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gamelink_core::{CharacterNo, GameAccountId, GoodsId};

pub use http::HttpGameGateway;
pub use sql::SqlGameGateway;

/// Errors that can occur when talking to the game store.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Game database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Game store answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Game store processed the command but reported failure.
    #[error("command rejected: {0}")]
    Rejected(String),

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// A character on a game account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    /// Character number.
    pub char_no: CharacterNo,
    /// Character name.
    pub name: String,
    /// Level.
    pub level: i32,
    /// Play time in minutes.
    pub playtime: i32,
    /// Carried money.
    pub money: i64,
    /// Class identifier.
    pub class_id: i32,
}

/// Commands the service can issue against the game store.
#[async_trait]
pub trait GameGateway: Send + Sync {
    /// Create a game account and return its number.
    async fn create_account(
        &self,
        username: &str,
        credential_hash: &str,
    ) -> Result<GameAccountId, GatewayError>;

    /// Deliver goods to an account's web storage.
    async fn grant_goods(
        &self,
        account: GameAccountId,
        goods: GoodsId,
        quantity: i32,
    ) -> Result<(), GatewayError>;

    /// List the live characters of an account.
    async fn list_characters(&self, account: GameAccountId)
    -> Result<Vec<Character>, GatewayError>;

    /// Find a character by name on an account.
    async fn find_character(
        &self,
        account: GameAccountId,
        name: &str,
    ) -> Result<Option<Character>, GatewayError> {
        Ok(self
            .list_characters(account)
            .await?
            .into_iter()
            .find(|c| c.name == name))
    }

    /// Move a character to its town spawn point.
    async fn move_to_town(&self, character: CharacterNo) -> Result<(), GatewayError>;
}
