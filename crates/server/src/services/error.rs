//! Domain errors shared by the linking, commerce and voucher engines.

use thiserror::Error;

use gamelink_core::{CatalogItemId, GoodsId};

use crate::db::RepositoryError;
use crate::gateway::GatewayError;

/// Broad failure categories. Each maps to one HTTP status family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed or out-of-range input.
    Validation,
    /// The operation conflicts with current state.
    StateConflict,
    /// A balance or cap does not allow the operation.
    ResourceExhausted,
    /// A referenced entity does not exist.
    NotFound,
    /// The caller has no linked game account.
    NotLinked,
    /// The game store failed; local changes were kept.
    Upstream,
    /// Anything else.
    Internal,
}

/// Errors returned by the domain services.
#[derive(Debug, Error)]
pub enum GameError {
    /// Request input failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The caller already has a game account.
    #[error("game account already linked")]
    AlreadyLinked,

    /// The caller has no game account.
    #[error("game account not linked")]
    NotLinked,

    /// The caller's user record does not exist.
    #[error("user not found")]
    UserNotFound,

    /// Catalog item missing or inactive.
    #[error("item {0} not found")]
    ItemNotFound(CatalogItemId),

    /// Catalog item has no contents.
    #[error("item {0} has no contents configured")]
    MisconfiguredItem(CatalogItemId),

    /// Balance does not cover the cost.
    #[error("insufficient balance")]
    InsufficientBalance,

    /// A goods grant failed after the balance was deducted.
    #[error("grant of goods {goods_id} failed: {source}")]
    GrantFailed {
        /// Goods that could not be delivered.
        goods_id: GoodsId,
        /// Gateway failure.
        #[source]
        source: GatewayError,
    },

    /// Voucher missing or inactive.
    #[error("voucher not found")]
    VoucherNotFound,

    /// Voucher has no contents.
    #[error("voucher has no contents configured")]
    MisconfiguredVoucher,

    /// The caller already redeemed this voucher.
    #[error("voucher already redeemed")]
    AlreadyRedeemed,

    /// The voucher's total cap is reached.
    #[error("voucher redemption limit reached")]
    RedemptionExhausted,

    /// Verification token does not exist.
    #[error("invalid verification token")]
    InvalidToken,

    /// Verification token is past its expiry.
    #[error("verification token expired")]
    TokenExpired,

    /// Verification token was already consumed.
    #[error("verification token already used")]
    TokenUsed,

    /// Character missing or owned by another account.
    #[error("character not found")]
    CharacterNotFound,

    /// Game store call failed.
    #[error("game store error: {0}")]
    Gateway(#[from] GatewayError),

    /// Local storage failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl GameError {
    /// Category of this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::AlreadyLinked | Self::AlreadyRedeemed | Self::TokenUsed | Self::TokenExpired => {
                ErrorClass::StateConflict
            }
            Self::InsufficientBalance | Self::RedemptionExhausted => ErrorClass::ResourceExhausted,
            Self::UserNotFound
            | Self::ItemNotFound(_)
            | Self::VoucherNotFound
            | Self::InvalidToken
            | Self::CharacterNotFound => ErrorClass::NotFound,
            Self::NotLinked => ErrorClass::NotLinked,
            Self::GrantFailed { .. } | Self::Gateway(_) => ErrorClass::Upstream,
            Self::MisconfiguredItem(_) | Self::MisconfiguredVoucher | Self::Repository(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::AlreadyLinked => "already_linked",
            Self::NotLinked => "account_not_linked",
            Self::UserNotFound => "user_not_found",
            Self::ItemNotFound(_) => "item_not_found",
            Self::MisconfiguredItem(_) => "item_misconfigured",
            Self::InsufficientBalance => "insufficient_balance",
            Self::GrantFailed { .. } => "grant_failed",
            Self::VoucherNotFound => "voucher_not_found",
            Self::MisconfiguredVoucher => "voucher_misconfigured",
            Self::AlreadyRedeemed => "already_redeemed",
            Self::RedemptionExhausted => "redemption_exhausted",
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::TokenUsed => "token_used",
            Self::CharacterNotFound => "character_not_found",
            Self::Gateway(_) => "upstream_error",
            Self::Repository(_) => "internal_error",
        }
    }

    /// Message safe to show to the caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::AlreadyLinked => "Game account already linked".to_string(),
            Self::NotLinked => "Please verify your account to create a game account".to_string(),
            Self::UserNotFound => "User not found".to_string(),
            Self::ItemNotFound(_) => "Item not found".to_string(),
            Self::MisconfiguredItem(_) => "Item has no contents configured".to_string(),
            Self::InsufficientBalance => "Insufficient balance".to_string(),
            Self::GrantFailed { .. } => "Failed to add item to game account".to_string(),
            Self::VoucherNotFound => "Invalid voucher code".to_string(),
            Self::MisconfiguredVoucher => "Voucher has no contents configured".to_string(),
            Self::AlreadyRedeemed => "You have already redeemed this voucher".to_string(),
            Self::RedemptionExhausted => "This voucher has reached its redemption limit".to_string(),
            Self::InvalidToken => "Invalid or unknown verification token".to_string(),
            Self::TokenExpired => "Verification token has expired".to_string(),
            Self::TokenUsed => "Verification token has already been used".to_string(),
            Self::CharacterNotFound => "Character not found".to_string(),
            Self::Gateway(_) => "Game service error".to_string(),
            Self::Repository(_) => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        assert_eq!(GameError::AlreadyLinked.class(), ErrorClass::StateConflict);
        assert_eq!(
            GameError::InsufficientBalance.class(),
            ErrorClass::ResourceExhausted
        );
        assert_eq!(
            GameError::RedemptionExhausted.class(),
            ErrorClass::ResourceExhausted
        );
        assert_eq!(GameError::NotLinked.class(), ErrorClass::NotLinked);
        assert_eq!(
            GameError::Gateway(GatewayError::Rejected("x".into())).class(),
            ErrorClass::Upstream
        );
        assert_eq!(
            GameError::Repository(RepositoryError::NotFound).class(),
            ErrorClass::Internal
        );
    }

    #[test]
    fn test_internal_details_are_not_public() {
        let err = GameError::Repository(RepositoryError::DataCorruption(
            "balance -5 for user".to_string(),
        ));
        assert!(!err.public_message().contains("balance"));

        let err = GameError::Gateway(GatewayError::Rejected("procedure returned 7".into()));
        assert!(!err.public_message().contains("procedure"));
    }

    #[test]
    fn test_not_linked_code() {
        assert_eq!(GameError::NotLinked.code(), "account_not_linked");
    }
}
