//! Character queries and the unstuck action.

use gamelink_core::{GameAccountId, UserId};

use super::error::GameError;
use crate::gateway::{Character, GameGateway};
use crate::store::UserStore;

/// Character service.
pub struct CharacterService<'a> {
    users: &'a dyn UserStore,
    gateway: &'a dyn GameGateway,
}

impl<'a> CharacterService<'a> {
    /// Create a new character service.
    #[must_use]
    pub fn new(users: &'a dyn UserStore, gateway: &'a dyn GameGateway) -> Self {
        Self { users, gateway }
    }

    /// Characters on the caller's game account.
    ///
    /// # Errors
    ///
    /// Returns `GameError::NotLinked` if the caller has no game account.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Character>, GameError> {
        let account = self.linked_account(user_id).await?;
        Ok(self.gateway.list_characters(account).await?)
    }

    /// Move one of the caller's characters back to town.
    ///
    /// # Errors
    ///
    /// Returns `GameError::CharacterNotFound` if no character by that name
    /// belongs to the caller's account.
    pub async fn unstuck(&self, user_id: UserId, name: &str) -> Result<Character, GameError> {
        let account = self.linked_account(user_id).await?;

        let character = self
            .gateway
            .find_character(account, name)
            .await?
            .ok_or(GameError::CharacterNotFound)?;

        self.gateway.move_to_town(character.char_no).await?;

        tracing::info!(
            user_id = %user_id,
            char_no = %character.char_no,
            "character moved to town"
        );
        Ok(character)
    }

    async fn linked_account(&self, user_id: UserId) -> Result<GameAccountId, GameError> {
        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or(GameError::UserNotFound)?;
        Ok(user.game.ok_or(GameError::NotLinked)?.account_id)
    }
}
