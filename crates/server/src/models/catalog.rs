//! Item shop catalog and purchase audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gamelink_core::{CatalogItemId, Coins, GoodsEntry, PurchaseId, UserId};

/// An item sold in the shop.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogItem {
    /// Item ID.
    pub id: CatalogItemId,
    /// Display name.
    pub name: String,
    /// Shop description.
    pub description: Option<String>,
    /// Price per unit.
    pub price: Coins,
    /// Whether the item is currently sold.
    pub active: bool,
    /// Goods granted per unit, in grant order.
    pub contents: Vec<GoodsEntry>,
}

impl CatalogItem {
    /// Items without contents cannot be delivered and must not be sold.
    #[must_use]
    pub fn is_deliverable(&self) -> bool {
        !self.contents.is_empty()
    }
}

/// An item definition as loaded by the seed command.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCatalogItem {
    /// Item ID (stable across reseeds).
    pub id: CatalogItemId,
    /// Display name.
    pub name: String,
    /// Shop description.
    #[serde(default)]
    pub description: Option<String>,
    /// Price per unit.
    pub price: Coins,
    /// Whether the item is sold.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Goods granted per unit.
    pub contents: Vec<GoodsEntry>,
}

const fn default_active() -> bool {
    true
}

/// Append-only audit row written in the same transaction as the balance deduction.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseRecord {
    /// Row ID.
    pub id: PurchaseId,
    /// Buyer.
    pub user_id: UserId,
    /// Item bought.
    pub item_id: CatalogItemId,
    /// Units bought.
    pub quantity: i32,
    /// Total deducted.
    pub cost: Coins,
    /// When the deduction committed.
    pub created_at: DateTime<Utc>,
}

/// A purchase about to be committed.
#[derive(Debug, Clone, Copy)]
pub struct PurchaseOrder {
    /// Item being bought.
    pub item_id: CatalogItemId,
    /// Units.
    pub quantity: u32,
    /// Total cost, already overflow-checked.
    pub cost: Coins,
}
