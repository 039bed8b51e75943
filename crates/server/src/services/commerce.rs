//! Item shop purchases.
//!
//! The balance deduction and the purchase record commit together before any
//! goods are delivered. Delivery is best effort: a failed grant is reported to
//! the caller and logged with enough context to reconcile by hand, but the
//! deduction stands.

use gamelink_core::{CatalogItemId, Coins, GoodsEntry, UserId};

use super::error::GameError;
use crate::gateway::GameGateway;
use crate::models::{CatalogItem, PurchaseOrder, PurchaseRecord};
use crate::store::{CatalogStore, PurchaseOutcome, UserStore};

/// Result of a completed purchase.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    /// Balance after the deduction.
    pub new_balance: Coins,
    /// Audit record written with the deduction.
    pub record: PurchaseRecord,
}

/// Shop service.
pub struct CommerceService<'a> {
    users: &'a dyn UserStore,
    catalog: &'a dyn CatalogStore,
    gateway: &'a dyn GameGateway,
}

impl<'a> CommerceService<'a> {
    /// Create a new commerce service.
    #[must_use]
    pub fn new(
        users: &'a dyn UserStore,
        catalog: &'a dyn CatalogStore,
        gateway: &'a dyn GameGateway,
    ) -> Self {
        Self {
            users,
            catalog,
            gateway,
        }
    }

    /// Active catalog items.
    ///
    /// # Errors
    ///
    /// Returns `GameError::Repository` if the catalog cannot be read.
    pub async fn list_items(&self) -> Result<Vec<CatalogItem>, GameError> {
        Ok(self.catalog.list_items().await?)
    }

    /// Buy `quantity` units of an item for the caller.
    ///
    /// Each content line is granted `entry.quantity * quantity` times, in the
    /// item's content order. Grants stop at the first failure.
    ///
    /// # Errors
    ///
    /// Returns `GameError::Validation` for a zero quantity or an overflowing
    /// cost, `GameError::NotLinked`, `GameError::ItemNotFound`,
    /// `GameError::MisconfiguredItem`, `GameError::InsufficientBalance`, or
    /// `GameError::GrantFailed` after the deduction has committed.
    pub async fn purchase(
        &self,
        user_id: UserId,
        item_id: CatalogItemId,
        quantity: u32,
    ) -> Result<PurchaseReceipt, GameError> {
        if quantity < 1 {
            return Err(GameError::Validation(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or(GameError::UserNotFound)?;
        let account = user.game.ok_or(GameError::NotLinked)?.account_id;

        let item = self
            .catalog
            .get_item(item_id)
            .await?
            .ok_or(GameError::ItemNotFound(item_id))?;
        if !item.is_deliverable() {
            return Err(GameError::MisconfiguredItem(item_id));
        }

        let cost = item
            .price
            .checked_times(quantity)
            .map_err(|_| GameError::Validation("Total cost is too large".to_string()))?;
        let grants = item
            .contents
            .iter()
            .map(|entry| entry.scaled(quantity))
            .collect::<Result<Vec<GoodsEntry>, _>>()
            .map_err(|_| GameError::Validation("Quantity is too large".to_string()))?;

        let order = PurchaseOrder {
            item_id,
            quantity,
            cost,
        };
        let (new_balance, record) = match self.users.purchase(user_id, &order).await? {
            PurchaseOutcome::Completed {
                new_balance,
                record,
            } => (new_balance, record),
            PurchaseOutcome::InsufficientBalance => return Err(GameError::InsufficientBalance),
        };

        for grant in grants {
            if let Err(source) = self
                .gateway
                .grant_goods(account, grant.goods_id, grant.quantity)
                .await
            {
                tracing::error!(
                    user_id = %user_id,
                    game_account_id = %account,
                    item_id = %item_id,
                    purchase_id = %record.id,
                    goods_id = %grant.goods_id,
                    quantity = grant.quantity,
                    error = %source,
                    "goods grant failed after balance deduction"
                );
                return Err(GameError::GrantFailed {
                    goods_id: grant.goods_id,
                    source,
                });
            }
        }

        tracing::info!(
            user_id = %user_id,
            item_id = %item_id,
            quantity,
            cost = %cost,
            new_balance = %new_balance,
            "purchase complete"
        );

        Ok(PurchaseReceipt {
            new_balance,
            record,
        })
    }
}
