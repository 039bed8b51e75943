//! In-memory implementation of every store trait.
//!
//! All state sits behind one mutex, so each trait method is atomic in the same
//! way the `PostgreSQL` transactions are.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use gamelink_core::{
    CatalogItemId, Coins, LinkToken, PurchaseId, RedemptionId, Role, UserId, VoucherCode,
    VoucherId,
};

use crate::db::RepositoryError;
use crate::models::{
    CatalogItem, GameLink, NewCatalogItem, NewVerificationToken, NewVoucher, PurchaseOrder,
    PurchaseRecord, RedemptionRecord, TokenState, User, VerificationToken, Voucher,
};
use crate::store::{
    CatalogStore, CompleteLinkOutcome, PurchaseOutcome, RedemptionOutcome, TokenRejection,
    UserStore, VerificationStore, VoucherStore,
};

#[derive(Default)]
struct State {
    users: Vec<User>,
    purchases: Vec<PurchaseRecord>,
    tokens: HashMap<String, VerificationToken>,
    items: BTreeMap<CatalogItemId, CatalogItem>,
    vouchers: Vec<Voucher>,
    redemptions: Vec<RedemptionRecord>,
    unavailable: bool,
}

impl State {
    fn user_mut(&mut self, id: UserId) -> Result<&mut User, RepositoryError> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepositoryError::NotFound)
    }

    fn account_taken(&self, link: &GameLink) -> bool {
        self.users
            .iter()
            .filter_map(|u| u.game.as_ref())
            .any(|g| g.account_id == link.account.account_id)
    }

    /// Write a link onto an unlinked user. `Ok(false)` if the user is linked.
    fn write_link(&mut self, id: UserId, link: &GameLink) -> Result<bool, RepositoryError> {
        if self.account_taken(link) {
            return Err(RepositoryError::Conflict(
                "game account already belongs to another user".to_string(),
            ));
        }
        let user = self.user_mut(id)?;
        if user.game.is_some() {
            return Ok(false);
        }
        user.game = Some(link.account.clone());
        if let Some(discord) = &link.discord {
            user.discord = Some(discord.clone());
        }
        user.updated_at = Utc::now();
        Ok(true)
    }

    fn redemption_count(&self, voucher: VoucherId) -> i64 {
        let count = self
            .redemptions
            .iter()
            .filter(|r| r.voucher_id == voucher)
            .count();
        i64::try_from(count).unwrap_or(i64::MAX)
    }
}

fn next_id(len: usize) -> i32 {
    i32::try_from(len).map_or(i32::MAX, |n| n + 1)
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a user as-is and return it.
    pub fn insert_user(&self, user: User) -> User {
        self.lock().users.push(user.clone());
        user
    }

    /// Add or replace a catalog item as-is.
    pub fn insert_item(&self, item: CatalogItem) {
        self.lock().items.insert(item.id, item);
    }

    /// Add a voucher, assigning it the next ID, and return it.
    pub fn insert_voucher(&self, mut voucher: Voucher) -> Voucher {
        let mut state = self.lock();
        voucher.id = VoucherId::new(next_id(state.vouchers.len()));
        state.vouchers.push(voucher.clone());
        voucher
    }

    /// Make `ping` fail, as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        if self.lock().unavailable {
            return Err(RepositoryError::DataCorruption(
                "store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let mut users = self.lock().users.clone();
        users.reverse();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn link_game_account(&self, id: UserId, link: &GameLink) -> Result<(), RepositoryError> {
        if self.lock().write_link(id, link)? {
            Ok(())
        } else {
            Err(RepositoryError::Conflict(
                "user already has a game account".to_string(),
            ))
        }
    }

    async fn purchase(
        &self,
        id: UserId,
        order: &PurchaseOrder,
    ) -> Result<PurchaseOutcome, RepositoryError> {
        let quantity = i32::try_from(order.quantity)
            .map_err(|_| RepositoryError::Conflict("quantity out of range".to_string()))?;

        let mut state = self.lock();
        let user = state.user_mut(id)?;
        let Some(new_balance) = user.balance.checked_sub(order.cost) else {
            return Ok(PurchaseOutcome::InsufficientBalance);
        };
        user.balance = new_balance;

        let record = PurchaseRecord {
            id: PurchaseId::new(next_id(state.purchases.len())),
            user_id: id,
            item_id: order.item_id,
            quantity,
            cost: order.cost,
            created_at: Utc::now(),
        };
        state.purchases.push(record.clone());

        Ok(PurchaseOutcome::Completed {
            new_balance,
            record,
        })
    }

    async fn purchases(&self, id: UserId) -> Result<Vec<PurchaseRecord>, RepositoryError> {
        Ok(self
            .lock()
            .purchases
            .iter()
            .filter(|p| p.user_id == id)
            .cloned()
            .collect())
    }

    async fn credit(&self, id: UserId, amount: Coins) -> Result<Coins, RepositoryError> {
        let mut state = self.lock();
        let user = state.user_mut(id)?;
        user.balance = user
            .balance
            .checked_add(amount)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        Ok(user.balance)
    }

    async fn update_profile_image(
        &self,
        id: UserId,
        profile_image: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        let user = state.user_mut(id)?;
        user.profile_image = profile_image.map(str::to_owned);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_role(&self, id: UserId, role: Role) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        let user = state.user_mut(id)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl VerificationStore for MemoryStore {
    async fn create(
        &self,
        token: &NewVerificationToken,
    ) -> Result<VerificationToken, RepositoryError> {
        let mut state = self.lock();
        let key = token.token.as_str().to_owned();
        if state.tokens.contains_key(&key) {
            return Err(RepositoryError::Conflict(
                "verification token already exists".to_string(),
            ));
        }

        let stored = VerificationToken {
            token: token.token.clone(),
            discord: token.discord.clone(),
            expires_at: token.expires_at,
            used: false,
            used_by: None,
            created_at: Utc::now(),
        };
        state.tokens.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get(&self, token: &LinkToken) -> Result<Option<VerificationToken>, RepositoryError> {
        Ok(self.lock().tokens.get(token.as_str()).cloned())
    }

    async fn complete_link(
        &self,
        token: &LinkToken,
        user: UserId,
        link: &GameLink,
    ) -> Result<CompleteLinkOutcome, RepositoryError> {
        let mut state = self.lock();
        state.user_mut(user)?;

        let Some(stored) = state.tokens.get(token.as_str()) else {
            return Ok(CompleteLinkOutcome::TokenRejected(TokenRejection::Missing));
        };
        match stored.state_at(Utc::now()) {
            TokenState::Pending => {}
            other => {
                return Ok(CompleteLinkOutcome::TokenRejected(
                    TokenRejection::Unusable(other),
                ));
            }
        }

        if !state.write_link(user, link)? {
            return Ok(CompleteLinkOutcome::AlreadyLinked);
        }

        if let Some(stored) = state.tokens.get_mut(token.as_str()) {
            stored.used = true;
            stored.used_by = Some(user);
        }
        Ok(CompleteLinkOutcome::Linked)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_item(&self, id: CatalogItemId) -> Result<Option<CatalogItem>, RepositoryError> {
        Ok(self.lock().items.get(&id).filter(|i| i.active).cloned())
    }

    async fn list_items(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        Ok(self
            .lock()
            .items
            .values()
            .filter(|i| i.active)
            .cloned()
            .collect())
    }

    async fn upsert_item(&self, item: &NewCatalogItem) -> Result<CatalogItem, RepositoryError> {
        let stored = CatalogItem {
            id: item.id,
            name: item.name.clone(),
            description: item.description.clone(),
            price: item.price,
            active: item.active,
            contents: item.contents.clone(),
        };
        self.lock().items.insert(item.id, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl VoucherStore for MemoryStore {
    async fn find_by_code(&self, code: &VoucherCode) -> Result<Option<Voucher>, RepositoryError> {
        Ok(self
            .lock()
            .vouchers
            .iter()
            .find(|v| v.active && v.code == *code)
            .cloned())
    }

    async fn has_redeemed(
        &self,
        user: UserId,
        voucher: VoucherId,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .lock()
            .redemptions
            .iter()
            .any(|r| r.user_id == user && r.voucher_id == voucher))
    }

    async fn redemption_count(&self, voucher: VoucherId) -> Result<i64, RepositoryError> {
        Ok(self.lock().redemption_count(voucher))
    }

    async fn record_redemption(
        &self,
        user: UserId,
        voucher: &Voucher,
    ) -> Result<RedemptionOutcome, RepositoryError> {
        let mut state = self.lock();

        let cap = state
            .vouchers
            .iter()
            .find(|v| v.id == voucher.id)
            .ok_or(RepositoryError::NotFound)?
            .max_total_redemptions;

        if state
            .redemptions
            .iter()
            .any(|r| r.user_id == user && r.voucher_id == voucher.id)
        {
            return Ok(RedemptionOutcome::AlreadyRedeemed);
        }
        if cap.is_some_and(|cap| state.redemption_count(voucher.id) >= i64::from(cap)) {
            return Ok(RedemptionOutcome::Exhausted);
        }

        let record = RedemptionRecord {
            id: RedemptionId::new(next_id(state.redemptions.len())),
            user_id: user,
            voucher_id: voucher.id,
            created_at: Utc::now(),
        };
        state.redemptions.push(record.clone());
        Ok(RedemptionOutcome::Recorded(record))
    }

    async fn upsert_voucher(&self, voucher: &NewVoucher) -> Result<Voucher, RepositoryError> {
        let mut state = self.lock();
        let next = VoucherId::new(next_id(state.vouchers.len()));

        if let Some(existing) = state.vouchers.iter_mut().find(|v| v.code == voucher.code) {
            existing.max_total_redemptions = voucher.max_total_redemptions;
            existing.active = voucher.active;
            existing.contents.clone_from(&voucher.contents);
            return Ok(existing.clone());
        }

        let stored = Voucher {
            id: next,
            code: voucher.code.clone(),
            max_total_redemptions: voucher.max_total_redemptions,
            active: voucher.active,
            contents: voucher.contents.clone(),
        };
        state.vouchers.push(stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::testing::{discord_identity, linked_user, test_user};

    #[tokio::test]
    async fn test_complete_link_is_all_or_nothing() {
        let store = MemoryStore::new();
        let linked = store.insert_user(linked_user("alice", 0, 1));
        let token = LinkToken::parse("tok").unwrap();
        store
            .create(&NewVerificationToken {
                token: token.clone(),
                discord: discord_identity(),
                expires_at: Utc::now() + Duration::minutes(5),
            })
            .await
            .unwrap();

        let link = linked_user("x", 0, 2).game.map(|account| GameLink {
            account,
            discord: Some(discord_identity()),
        });
        let outcome = store
            .complete_link(&token, linked.id, &link.unwrap())
            .await
            .unwrap();

        assert_eq!(outcome, CompleteLinkOutcome::AlreadyLinked);
        assert!(!VerificationStore::get(&store, &token).await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn test_complete_link_for_missing_user_is_not_found() {
        let store = MemoryStore::new();
        let token = LinkToken::parse("tok").unwrap();
        store
            .create(&NewVerificationToken {
                token: token.clone(),
                discord: discord_identity(),
                expires_at: Utc::now() + Duration::minutes(5),
            })
            .await
            .unwrap();
        let link = GameLink {
            account: linked_user("x", 0, 2).game.unwrap(),
            discord: Some(discord_identity()),
        };

        let err = store
            .complete_link(&token, UserId::generate(), &link)
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::NotFound));
        assert!(!VerificationStore::get(&store, &token).await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn test_credit_adds_to_balance() {
        let store = MemoryStore::new();
        let user = store.insert_user(test_user("alice", 10));
        let balance = store
            .credit(user.id, Coins::new(5).unwrap())
            .await
            .unwrap();
        assert_eq!(balance, Coins::new(15).unwrap());
    }
}
