//! Account linking: identity → game account, directly or gated by a Discord
//! verification token.
//!
//! The game account is created remotely first and the local link is written
//! afterwards with a conditional update. If the local write loses a race the
//! remote account is orphaned; that case is logged at error level with the
//! user, account and username so it can be cleaned up by hand.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use gamelink_core::{GameAccountId, LinkToken, UserId};

use super::error::GameError;
use super::notify::{BotNotifier, LinkNotification, spawn_link_notification};
use crate::db::RepositoryError;
use crate::gateway::GameGateway;
use crate::models::{
    ApiKey, DiscordIdentity, GameLink, LinkedAccount, NewVerificationToken, TokenState, User,
};
use crate::store::{CompleteLinkOutcome, TokenRejection, UserStore, VerificationStore};

/// A completed Discord-verified link.
#[derive(Debug, Clone)]
pub struct VerifiedLink {
    /// Created game account.
    pub game_account_id: GameAccountId,
    /// Discord identity now recorded on the user.
    pub discord: DiscordIdentity,
}

/// Account linking service.
pub struct LinkingService<'a> {
    users: &'a dyn UserStore,
    tokens: &'a dyn VerificationStore,
    gateway: &'a dyn GameGateway,
    notifier: &'a Arc<dyn BotNotifier>,
}

impl<'a> LinkingService<'a> {
    /// Create a new linking service.
    #[must_use]
    pub fn new(
        users: &'a dyn UserStore,
        tokens: &'a dyn VerificationStore,
        gateway: &'a dyn GameGateway,
        notifier: &'a Arc<dyn BotNotifier>,
    ) -> Self {
        Self {
            users,
            tokens,
            gateway,
            notifier,
        }
    }

    /// Store a verification token issued by the bot.
    ///
    /// # Errors
    ///
    /// Returns `GameError::Validation` if the token value is already taken.
    pub async fn issue_token(&self, token: &NewVerificationToken) -> Result<(), GameError> {
        self.tokens.create(token).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                GameError::Validation("Verification token already exists".to_string())
            }
            other => other.into(),
        })?;

        tracing::info!(
            discord_id = %token.discord.discord_id,
            expires_at = %token.expires_at,
            "verification token created"
        );
        Ok(())
    }

    /// Create a game account named after the user and link it.
    ///
    /// # Errors
    ///
    /// Returns `GameError::AlreadyLinked` if the user has (or concurrently
    /// gains) a game account, and `GameError::Gateway` if the game store
    /// refuses to create the account.
    pub async fn link_direct(&self, user_id: UserId) -> Result<GameAccountId, GameError> {
        let user = self.unlinked_user(user_id).await?;

        let api_key = ApiKey::generate();
        let account_id = self
            .gateway
            .create_account(&user.username, &api_key.digest())
            .await?;

        let link = GameLink {
            account: LinkedAccount {
                account_id,
                api_key,
            },
            discord: None,
        };

        match self.users.link_game_account(user_id, &link).await {
            Ok(()) => {
                tracing::info!(
                    user_id = %user_id,
                    game_account_id = %account_id,
                    "game account linked"
                );
                Ok(account_id)
            }
            Err(e) => {
                log_orphan(user_id, account_id, &user.username, &e);
                Err(match e {
                    RepositoryError::Conflict(_) => GameError::AlreadyLinked,
                    other => other.into(),
                })
            }
        }
    }

    /// Consume a verification token, create a game account named after the
    /// Discord user, and link both the account and the Discord identity.
    ///
    /// On success the bot is notified on a detached task.
    ///
    /// # Errors
    ///
    /// Returns `GameError::AlreadyLinked` if the caller is linked (checked
    /// before the token), `GameError::InvalidToken`, `GameError::TokenUsed` or
    /// `GameError::TokenExpired` for unusable tokens, and `GameError::Gateway`
    /// if account creation fails.
    pub async fn link_via_verification(
        &self,
        user_id: UserId,
        token: &LinkToken,
        now: DateTime<Utc>,
    ) -> Result<VerifiedLink, GameError> {
        self.unlinked_user(user_id).await?;

        let verification = self
            .tokens
            .get(token)
            .await?
            .ok_or(GameError::InvalidToken)?;

        match verification.state_at(now) {
            TokenState::Pending => {}
            TokenState::Used => return Err(GameError::TokenUsed),
            TokenState::Expired => return Err(GameError::TokenExpired),
        }

        let discord = verification.discord;
        let username = discord.discord_username.clone();

        let api_key = ApiKey::generate();
        let account_id = self
            .gateway
            .create_account(&username, &api_key.digest())
            .await?;

        let link = GameLink {
            account: LinkedAccount {
                account_id,
                api_key,
            },
            discord: Some(discord.clone()),
        };

        let outcome = self
            .tokens
            .complete_link(token, user_id, &link)
            .await
            .map_err(|e| {
                log_orphan(user_id, account_id, &username, &e);
                match e {
                    RepositoryError::NotFound => GameError::UserNotFound,
                    other => other.into(),
                }
            })?;

        match outcome {
            CompleteLinkOutcome::Linked => {}
            CompleteLinkOutcome::AlreadyLinked => {
                log_orphan(user_id, account_id, &username, &"user linked concurrently");
                return Err(GameError::AlreadyLinked);
            }
            CompleteLinkOutcome::TokenRejected(rejection) => {
                log_orphan(user_id, account_id, &username, &"token consumed concurrently");
                return Err(match rejection {
                    TokenRejection::Missing => GameError::InvalidToken,
                    TokenRejection::Unusable(TokenState::Expired) => GameError::TokenExpired,
                    TokenRejection::Unusable(_) => GameError::TokenUsed,
                });
            }
        }

        tracing::info!(
            user_id = %user_id,
            discord_id = %discord.discord_id,
            game_account_id = %account_id,
            "discord verification complete"
        );

        spawn_link_notification(
            Arc::clone(self.notifier),
            LinkNotification::now(discord.discord_id.clone(), username, account_id),
        );

        Ok(VerifiedLink {
            game_account_id: account_id,
            discord,
        })
    }

    async fn unlinked_user(&self, user_id: UserId) -> Result<User, GameError> {
        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or(GameError::UserNotFound)?;

        if user.is_linked() {
            return Err(GameError::AlreadyLinked);
        }
        Ok(user)
    }
}

fn log_orphan(
    user_id: UserId,
    account_id: GameAccountId,
    username: &str,
    reason: &dyn std::fmt::Display,
) {
    tracing::error!(
        user_id = %user_id,
        game_account_id = %account_id,
        username = %username,
        reason = %reason,
        "game account created but local link failed; remote account orphaned"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::testing::{FakeGateway, MemoryStore, RecordingNotifier, discord_identity, test_user};

    struct Fixture {
        store: MemoryStore,
        gateway: FakeGateway,
        notifier: Arc<RecordingNotifier>,
        notifier_dyn: Arc<dyn BotNotifier>,
    }

    impl Fixture {
        fn new() -> Self {
            let notifier = Arc::new(RecordingNotifier::default());
            Self {
                store: MemoryStore::new(),
                gateway: FakeGateway::new(),
                notifier_dyn: notifier.clone(),
                notifier,
            }
        }

        fn service(&self) -> LinkingService<'_> {
            LinkingService::new(&self.store, &self.store, &self.gateway, &self.notifier_dyn)
        }

        async fn token(&self, value: &str, expires_in: Duration) -> LinkToken {
            let token = LinkToken::parse(value).unwrap();
            self.store
                .create(&NewVerificationToken {
                    token: token.clone(),
                    discord: discord_identity(),
                    expires_at: Utc::now() + expires_in,
                })
                .await
                .unwrap();
            token
        }
    }

    #[tokio::test]
    async fn test_link_direct_creates_account_named_after_user() {
        let f = Fixture::new();
        let user = f.store.insert_user(test_user("alice", 0));

        let account = f.service().link_direct(user.id).await.unwrap();

        let stored = UserStore::get(&f.store, user.id).await.unwrap().unwrap();
        let game = stored.game.unwrap();
        assert_eq!(game.account_id, account);
        let created = f.gateway.created_accounts();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, "alice");
        assert_eq!(created[0].1, game.api_key.digest());
    }

    #[tokio::test]
    async fn test_link_direct_twice_is_already_linked() {
        let f = Fixture::new();
        let user = f.store.insert_user(test_user("alice", 0));

        f.service().link_direct(user.id).await.unwrap();
        let err = f.service().link_direct(user.id).await.unwrap_err();

        assert!(matches!(err, GameError::AlreadyLinked));
        assert_eq!(f.gateway.created_accounts().len(), 1);
    }

    #[tokio::test]
    async fn test_link_direct_gateway_failure_leaves_user_unlinked() {
        let f = Fixture::new();
        let user = f.store.insert_user(test_user("alice", 0));
        f.gateway.fail_account_creation();

        let err = f.service().link_direct(user.id).await.unwrap_err();

        assert!(matches!(err, GameError::Gateway(_)));
        let stored = UserStore::get(&f.store, user.id).await.unwrap().unwrap();
        assert!(!stored.is_linked());
    }

    #[tokio::test]
    async fn test_concurrent_direct_links_link_once() {
        let f = Fixture::new();
        let user = f.store.insert_user(test_user("alice", 0));

        let service = f.service();
        let (a, b) = tokio::join!(service.link_direct(user.id), service.link_direct(user.id));

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        assert!(
            matches!(a, Err(GameError::AlreadyLinked)) || matches!(b, Err(GameError::AlreadyLinked))
        );
    }

    #[tokio::test]
    async fn test_verified_link_records_discord_and_consumes_token() {
        let f = Fixture::new();
        let user = f.store.insert_user(test_user("alice", 0));
        let token = f.token("tok-valid", Duration::minutes(15)).await;

        let link = f
            .service()
            .link_via_verification(user.id, &token, Utc::now())
            .await
            .unwrap();

        let stored = UserStore::get(&f.store, user.id).await.unwrap().unwrap();
        assert_eq!(stored.game.unwrap().account_id, link.game_account_id);
        assert_eq!(stored.discord, Some(discord_identity()));
        assert_eq!(f.gateway.created_accounts()[0].0, "player#0001");

        let consumed = VerificationStore::get(&f.store, &token).await.unwrap().unwrap();
        assert!(consumed.used);
        assert_eq!(consumed.used_by, Some(user.id));

        let sent = f.notifier.wait_for(1).await;
        assert_eq!(sent[0].discord_id, "123456789");
        assert_eq!(sent[0].game_account_id, link.game_account_id);
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let f = Fixture::new();
        let user = f.store.insert_user(test_user("alice", 0));
        let token = LinkToken::parse("nope").unwrap();

        let err = f
            .service()
            .link_via_verification(user.id, &token, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidToken));
    }

    #[tokio::test]
    async fn test_expired_unused_token() {
        let f = Fixture::new();
        let user = f.store.insert_user(test_user("alice", 0));
        let token = f.token("tok-old", Duration::minutes(-1)).await;

        let err = f
            .service()
            .link_via_verification(user.id, &token, Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, GameError::TokenExpired));
        assert!(f.gateway.created_accounts().is_empty());
    }

    #[tokio::test]
    async fn test_used_token() {
        let f = Fixture::new();
        let first = f.store.insert_user(test_user("alice", 0));
        let second = f.store.insert_user(test_user("bob", 0));
        let token = f.token("tok-once", Duration::minutes(15)).await;

        f.service()
            .link_via_verification(first.id, &token, Utc::now())
            .await
            .unwrap();
        let err = f
            .service()
            .link_via_verification(second.id, &token, Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, GameError::TokenUsed));
    }

    #[tokio::test]
    async fn test_linked_user_is_already_linked_regardless_of_token() {
        let f = Fixture::new();
        let user = f.store.insert_user(test_user("alice", 0));
        f.service().link_direct(user.id).await.unwrap();

        let valid = f.token("tok-valid", Duration::minutes(15)).await;
        let expired = f.token("tok-old", Duration::minutes(-1)).await;
        let missing = LinkToken::parse("missing").unwrap();

        for token in [valid.clone(), expired, missing] {
            let err = f
                .service()
                .link_via_verification(user.id, &token, Utc::now())
                .await
                .unwrap_err();
            assert!(matches!(err, GameError::AlreadyLinked));
        }

        let untouched = VerificationStore::get(&f.store, &valid).await.unwrap().unwrap();
        assert!(!untouched.used);
    }

    #[tokio::test]
    async fn test_user_deleted_before_completion_is_not_found() {
        let f = Fixture::new();
        let user = f.store.insert_user(test_user("alice", 0));
        // The token store has never seen the user.
        let tokens = MemoryStore::new();
        let token = LinkToken::parse("tok-orphan").unwrap();
        tokens
            .create(&NewVerificationToken {
                token: token.clone(),
                discord: discord_identity(),
                expires_at: Utc::now() + Duration::minutes(15),
            })
            .await
            .unwrap();

        let err = LinkingService::new(&f.store, &tokens, &f.gateway, &f.notifier_dyn)
            .link_via_verification(user.id, &token, Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, GameError::UserNotFound));
        assert!(!VerificationStore::get(&tokens, &token).await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn test_issue_duplicate_token_is_rejected() {
        let f = Fixture::new();
        let new = NewVerificationToken {
            token: LinkToken::parse("dup").unwrap(),
            discord: discord_identity(),
            expires_at: Utc::now() + Duration::minutes(15),
        };

        f.service().issue_token(&new).await.unwrap();
        let err = f.service().issue_token(&new).await.unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
    }
}
