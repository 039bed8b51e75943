//! Vouchers and redemption audit records.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use gamelink_core::{GoodsEntry, RedemptionId, UserId, VoucherCode, VoucherId};

/// A redeemable voucher.
#[derive(Debug, Clone)]
pub struct Voucher {
    /// Voucher ID.
    pub id: VoucherId,
    /// Code players type in.
    pub code: VoucherCode,
    /// Total redemptions allowed across all users; `None` is unlimited.
    pub max_total_redemptions: Option<i32>,
    /// Whether the voucher can be redeemed.
    pub active: bool,
    /// Goods granted on redemption.
    pub contents: Vec<GoodsEntry>,
}

/// A voucher definition as loaded by the seed command.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVoucher {
    /// Code players type in.
    pub code: VoucherCode,
    /// Total redemption cap.
    #[serde(default)]
    pub max_total_redemptions: Option<i32>,
    /// Whether the voucher can be redeemed.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Goods granted on redemption.
    pub contents: Vec<GoodsEntry>,
}

const fn default_active() -> bool {
    true
}

/// Proof that a user redeemed a voucher. Unique per `(user_id, voucher_id)`.
#[derive(Debug, Clone)]
pub struct RedemptionRecord {
    /// Row ID.
    pub id: RedemptionId,
    /// Redeemer.
    pub user_id: UserId,
    /// Voucher redeemed.
    pub voucher_id: VoucherId,
    /// When the redemption committed.
    pub created_at: DateTime<Utc>,
}
