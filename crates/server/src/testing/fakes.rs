//! Recording stand-ins for the game store and the Discord bot.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use gamelink_core::{CharacterNo, GameAccountId, GoodsId};

use crate::gateway::{Character, GameGateway, GatewayError};
use crate::services::notify::{BotNotifier, LinkNotification, NotifyError};

/// First account number handed out by [`FakeGateway`].
const FIRST_ACCOUNT: i32 = 1000;

#[derive(Default)]
struct GatewayState {
    accounts: Vec<(String, String)>,
    grants: Vec<(GameAccountId, GoodsId, i32)>,
    failing_goods: HashSet<GoodsId>,
    fail_create: bool,
    characters: Vec<(GameAccountId, Character)>,
    moved: Vec<CharacterNo>,
}

/// Game gateway that records every call and fails on request.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<GatewayState>,
}

impl FakeGateway {
    /// Create a gateway where everything succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every future account creation fail.
    pub fn fail_account_creation(&self) {
        self.lock().fail_create = true;
    }

    /// Make every grant of `goods` fail.
    pub fn fail_grants_of(&self, goods: GoodsId) {
        self.lock().failing_goods.insert(goods);
    }

    /// Give an account a character.
    pub fn add_character(&self, account: GameAccountId, character: Character) {
        self.lock().characters.push((account, character));
    }

    /// `(username, credential_hash)` of every created account.
    #[must_use]
    pub fn created_accounts(&self) -> Vec<(String, String)> {
        self.lock().accounts.clone()
    }

    /// Successful grants, in call order.
    #[must_use]
    pub fn grants(&self) -> Vec<(GameAccountId, GoodsId, i32)> {
        self.lock().grants.clone()
    }

    /// Characters moved to town, in call order.
    #[must_use]
    pub fn moved(&self) -> Vec<CharacterNo> {
        self.lock().moved.clone()
    }
}

#[async_trait]
impl GameGateway for FakeGateway {
    async fn create_account(
        &self,
        username: &str,
        credential_hash: &str,
    ) -> Result<GameAccountId, GatewayError> {
        let mut state = self.lock();
        if state.fail_create {
            return Err(GatewayError::Api {
                status: 503,
                message: "account service unavailable".to_string(),
            });
        }
        state
            .accounts
            .push((username.to_owned(), credential_hash.to_owned()));
        let offset = i32::try_from(state.accounts.len()).unwrap_or(i32::MAX - FIRST_ACCOUNT);
        Ok(GameAccountId::new(FIRST_ACCOUNT + offset))
    }

    async fn grant_goods(
        &self,
        account: GameAccountId,
        goods: GoodsId,
        quantity: i32,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        if state.failing_goods.contains(&goods) {
            return Err(GatewayError::Rejected(format!(
                "web storage delivery of {goods} failed"
            )));
        }
        state.grants.push((account, goods, quantity));
        Ok(())
    }

    async fn list_characters(
        &self,
        account: GameAccountId,
    ) -> Result<Vec<Character>, GatewayError> {
        Ok(self
            .lock()
            .characters
            .iter()
            .filter(|(owner, _)| *owner == account)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn move_to_town(&self, character: CharacterNo) -> Result<(), GatewayError> {
        self.lock().moved.push(character);
        Ok(())
    }
}

/// Bot notifier that keeps every notification it is given.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<LinkNotification>>,
}

impl RecordingNotifier {
    /// Notifications received so far.
    #[must_use]
    pub fn sent(&self) -> Vec<LinkNotification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait up to one second for `count` notifications to arrive.
    pub async fn wait_for(&self, count: usize) -> Vec<LinkNotification> {
        for _ in 0..200 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl BotNotifier for RecordingNotifier {
    async fn notify_linked(&self, notification: &LinkNotification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }
}
