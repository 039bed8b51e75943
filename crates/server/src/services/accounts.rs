//! Profiles, game credentials and admin user management.

use gamelink_core::{Role, UserId};

use super::error::GameError;
use crate::db::RepositoryError;
use crate::models::{GameCredentials, PublicProfile, User};
use crate::store::UserStore;

/// Number of stock avatars players can pick from.
const AVATAR_COUNT: u8 = 20;

/// Account service.
pub struct AccountService<'a> {
    users: &'a dyn UserStore,
}

impl<'a> AccountService<'a> {
    /// Create a new account service.
    #[must_use]
    pub fn new(users: &'a dyn UserStore) -> Self {
        Self { users }
    }

    /// Game login credentials of the caller.
    ///
    /// # Errors
    ///
    /// Returns `GameError::NotLinked` if the caller has no game account.
    pub async fn credentials(&self, user_id: UserId) -> Result<GameCredentials, GameError> {
        self.user(user_id)
            .await?
            .game_credentials()
            .ok_or(GameError::NotLinked)
    }

    /// Public profile of any user.
    ///
    /// # Errors
    ///
    /// Returns `GameError::UserNotFound` if the user does not exist.
    pub async fn profile(&self, user_id: UserId) -> Result<PublicProfile, GameError> {
        Ok(self.user(user_id).await?.profile())
    }

    /// Set the caller's profile image to one of the stock avatars.
    ///
    /// # Errors
    ///
    /// Returns `GameError::Validation` unless the name is `avatar-1.png`
    /// through `avatar-20.png`.
    pub async fn update_profile_image(
        &self,
        user_id: UserId,
        image: &str,
    ) -> Result<PublicProfile, GameError> {
        if !is_stock_avatar(image) {
            return Err(GameError::Validation(
                "Invalid avatar selection. Must be avatar-1.png through avatar-20.png".to_string(),
            ));
        }

        self.users
            .update_profile_image(user_id, Some(image))
            .await
            .map_err(not_found_as_user)?;
        self.profile(user_id).await
    }

    /// All users, newest first.
    ///
    /// # Errors
    ///
    /// Returns `GameError::Repository` if the ledger cannot be read.
    pub async fn list_users(&self) -> Result<Vec<User>, GameError> {
        Ok(self.users.list().await?)
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `GameError::UserNotFound` if the user does not exist.
    pub async fn update_role(
        &self,
        actor: UserId,
        user_id: UserId,
        role: Role,
    ) -> Result<(), GameError> {
        self.users
            .update_role(user_id, role)
            .await
            .map_err(not_found_as_user)?;

        tracing::info!(actor = %actor, user_id = %user_id, role = %role, "user role updated");
        Ok(())
    }

    async fn user(&self, user_id: UserId) -> Result<User, GameError> {
        self.users
            .get(user_id)
            .await?
            .ok_or(GameError::UserNotFound)
    }
}

/// `avatar-<n>.png` with `n` in `1..=AVATAR_COUNT`, no leading zeros.
fn is_stock_avatar(name: &str) -> bool {
    let Some(n) = name
        .strip_prefix("avatar-")
        .and_then(|rest| rest.strip_suffix(".png"))
    else {
        return false;
    };
    if n.starts_with('0') || !n.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    n.parse::<u8>().is_ok_and(|n| (1..=AVATAR_COUNT).contains(&n))
}

fn not_found_as_user(e: RepositoryError) -> GameError {
    match e {
        RepositoryError::NotFound => GameError::UserNotFound,
        other => other.into(),
    }
}
