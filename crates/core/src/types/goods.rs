//! Goods bundled into catalog items and vouchers.

use serde::{Deserialize, Serialize};

use super::id::GoodsId;

/// Errors that can occur when building a [`GoodsEntry`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GoodsEntryError {
    /// Quantity must be at least one.
    #[error("goods quantity must be positive (got {0})")]
    NonPositiveQuantity(i32),
    /// Scaling the quantity overflowed.
    #[error("goods quantity overflow")]
    Overflow,
}

/// One `(goods, quantity)` line of a catalog item or voucher.
///
/// The goods ID refers to the external game store's goods table; this service
/// never reads goods state back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsEntry {
    /// Goods number in the game store.
    pub goods_id: GoodsId,
    /// How many to grant.
    pub quantity: i32,
}

impl GoodsEntry {
    /// Create an entry, rejecting non-positive quantities.
    ///
    /// # Errors
    ///
    /// Returns `GoodsEntryError::NonPositiveQuantity` if `quantity < 1`.
    pub const fn new(goods_id: GoodsId, quantity: i32) -> Result<Self, GoodsEntryError> {
        if quantity < 1 {
            return Err(GoodsEntryError::NonPositiveQuantity(quantity));
        }
        Ok(Self { goods_id, quantity })
    }

    /// The entry granted when the bundle is bought `times` times.
    ///
    /// # Errors
    ///
    /// Returns `GoodsEntryError::Overflow` if the scaled quantity does not fit.
    pub fn scaled(self, times: u32) -> Result<Self, GoodsEntryError> {
        let times = i32::try_from(times).map_err(|_| GoodsEntryError::Overflow)?;
        let quantity = self
            .quantity
            .checked_mul(times)
            .ok_or(GoodsEntryError::Overflow)?;
        Self::new(self.goods_id, quantity)
    }
}
