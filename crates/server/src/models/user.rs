//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use gamelink_core::{Coins, GameAccountId, Role, UserId};

use super::credential::ApiKey;

/// A user of the identity ledger.
///
/// Accounts are registered by the central auth service; this service owns the
/// balance, the game link and the Discord handle.
#[derive(Debug, Clone)]
pub struct User {
    /// Stable user ID.
    pub id: UserId,
    /// Login name, also used as the game account name for direct links.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Permission level.
    pub role: Role,
    /// Spendable currency.
    pub balance: Coins,
    /// Linked game account. The account ID and key are only ever set together.
    pub game: Option<LinkedAccount>,
    /// Linked Discord identity, if the account was verified through the bot.
    pub discord: Option<DiscordIdentity>,
    /// Profile image URL.
    pub profile_image: Option<String>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether a game account is already linked.
    #[must_use]
    pub const fn is_linked(&self) -> bool {
        self.game.is_some()
    }

    /// Credentials for the game client, if linked.
    #[must_use]
    pub fn game_credentials(&self) -> Option<GameCredentials> {
        self.game.as_ref().map(|game| GameCredentials {
            username: self.username.clone(),
            api_key: game.api_key.clone(),
            game_account_id: game.account_id,
        })
    }

    /// Public view of this user.
    #[must_use]
    pub fn profile(&self) -> PublicProfile {
        PublicProfile {
            user_id: self.id,
            username: self.username.clone(),
            role: self.role,
            profile_image: self.profile_image.clone(),
            created_at: self.created_at,
        }
    }
}

/// A game account owned by a user.
#[derive(Debug, Clone)]
pub struct LinkedAccount {
    /// Account number in the game store.
    pub account_id: GameAccountId,
    /// Plaintext login key.
    pub api_key: ApiKey,
}

/// A Discord account verified through the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscordIdentity {
    /// Discord snowflake ID.
    pub discord_id: String,
    /// Discord username at verification time.
    pub discord_username: String,
}

/// What the game client needs to log in.
#[derive(Debug, Clone)]
pub struct GameCredentials {
    /// Account name.
    pub username: String,
    /// Login key.
    pub api_key: ApiKey,
    /// Game account number.
    pub game_account_id: GameAccountId,
}

/// Everything written when a user is linked to a game account.
#[derive(Debug, Clone)]
pub struct GameLink {
    /// Account created in the game store.
    pub account: LinkedAccount,
    /// Discord identity to record alongside, for verified links.
    pub discord: Option<DiscordIdentity>,
}

/// Publicly visible profile fields.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    /// User ID.
    pub user_id: UserId,
    /// Username.
    pub username: String,
    /// Role.
    pub role: Role,
    /// Profile image URL (empty when unset).
    pub profile_image: Option<String>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}
