//! Storage seams used by the linking, commerce and voucher engines.
//!
//! Each trait is implemented by a `PostgreSQL` repository in [`crate::db`] and
//! by the in-memory store used in tests. Every operation that must be atomic
//! under concurrent requests is a single trait method, so callers never
//! compose a check and a write themselves.

use async_trait::async_trait;

use gamelink_core::{CatalogItemId, Coins, LinkToken, Role, UserId, VoucherCode, VoucherId};

use crate::db::RepositoryError;
use crate::models::{
    CatalogItem, GameLink, NewCatalogItem, NewVerificationToken, NewVoucher, PurchaseOrder,
    PurchaseRecord, RedemptionRecord, TokenState, User, VerificationToken, Voucher,
};

/// Result of the conditional balance deduction.
#[derive(Debug, Clone)]
pub enum PurchaseOutcome {
    /// Balance deducted and purchase recorded.
    Completed {
        /// Balance after the deduction.
        new_balance: Coins,
        /// Audit row written in the same transaction.
        record: PurchaseRecord,
    },
    /// The balance did not cover the cost; nothing was written.
    InsufficientBalance,
}

/// Result of consuming a verification token and linking in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteLinkOutcome {
    /// Token consumed and link written.
    Linked,
    /// The token could not be consumed; nothing was written.
    TokenRejected(TokenRejection),
    /// The user was linked concurrently; nothing was written.
    AlreadyLinked,
}

/// Why a token could not be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    /// No such token.
    Missing,
    /// Token in a terminal state.
    Unusable(TokenState),
}

/// Result of recording a voucher redemption.
#[derive(Debug, Clone)]
pub enum RedemptionOutcome {
    /// Redemption committed.
    Recorded(RedemptionRecord),
    /// This user already redeemed this voucher.
    AlreadyRedeemed,
    /// The voucher's total redemption cap is reached.
    Exhausted,
}

/// The identity ledger: users, balances and game links.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Get a user by ID.
    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// List all users, newest first.
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;

    /// Set the game account (and Discord identity, if any) on a user that has
    /// no game account yet.
    ///
    /// Returns `RepositoryError::Conflict` if the user is already linked and
    /// `RepositoryError::NotFound` if the user does not exist.
    async fn link_game_account(&self, id: UserId, link: &GameLink) -> Result<(), RepositoryError>;

    /// Deduct `order.cost` if and only if the balance covers it, and record the
    /// purchase in the same transaction.
    async fn purchase(
        &self,
        id: UserId,
        order: &PurchaseOrder,
    ) -> Result<PurchaseOutcome, RepositoryError>;

    /// Purchases made by a user, oldest first.
    async fn purchases(&self, id: UserId) -> Result<Vec<PurchaseRecord>, RepositoryError>;

    /// Add currency to a user's balance and return the new balance.
    async fn credit(&self, id: UserId, amount: Coins) -> Result<Coins, RepositoryError>;

    /// Replace the profile image.
    async fn update_profile_image(
        &self,
        id: UserId,
        profile_image: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Change a user's role.
    async fn update_role(&self, id: UserId, role: Role) -> Result<(), RepositoryError>;
}

/// Discord verification tokens.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Store a new token. Returns `RepositoryError::Conflict` if the token value exists.
    async fn create(
        &self,
        token: &NewVerificationToken,
    ) -> Result<VerificationToken, RepositoryError>;

    /// Look up a token.
    async fn get(&self, token: &LinkToken) -> Result<Option<VerificationToken>, RepositoryError>;

    /// Consume `token` for `user` and write `link` onto the user, atomically.
    ///
    /// The token is consumed only if it is unused and unexpired; the link is
    /// written only if the user has no game account. Either both happen or
    /// neither does. Returns `RepositoryError::NotFound` if the user does not
    /// exist.
    async fn complete_link(
        &self,
        token: &LinkToken,
        user: UserId,
        link: &GameLink,
    ) -> Result<CompleteLinkOutcome, RepositoryError>;
}

/// The shop catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Get an active item with its contents.
    async fn get_item(&self, id: CatalogItemId) -> Result<Option<CatalogItem>, RepositoryError>;

    /// List active items with their contents.
    async fn list_items(&self) -> Result<Vec<CatalogItem>, RepositoryError>;

    /// Insert or replace an item and its contents.
    async fn upsert_item(&self, item: &NewCatalogItem) -> Result<CatalogItem, RepositoryError>;
}

/// Vouchers and their redemptions.
#[async_trait]
pub trait VoucherStore: Send + Sync {
    /// Find an active voucher by code.
    async fn find_by_code(&self, code: &VoucherCode) -> Result<Option<Voucher>, RepositoryError>;

    /// Whether a user already redeemed a voucher.
    async fn has_redeemed(&self, user: UserId, voucher: VoucherId)
    -> Result<bool, RepositoryError>;

    /// Total redemptions of a voucher across all users.
    async fn redemption_count(&self, voucher: VoucherId) -> Result<i64, RepositoryError>;

    /// Record a redemption, enforcing the per-user uniqueness and the
    /// voucher's total cap atomically.
    async fn record_redemption(
        &self,
        user: UserId,
        voucher: &Voucher,
    ) -> Result<RedemptionOutcome, RepositoryError>;

    /// Insert or replace a voucher (keyed by code) and its contents.
    async fn upsert_voucher(&self, voucher: &NewVoucher) -> Result<Voucher, RepositoryError>;
}
