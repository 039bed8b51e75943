//! Core types for GameLink.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod coins;
pub mod goods;
pub mod id;
pub mod link_token;
pub mod role;
pub mod voucher_code;

pub use coins::{Coins, CoinsError};
pub use goods::{GoodsEntry, GoodsEntryError};
pub use id::*;
pub use link_token::{LinkToken, LinkTokenError};
pub use role::Role;
pub use voucher_code::{VoucherCode, VoucherCodeError};
