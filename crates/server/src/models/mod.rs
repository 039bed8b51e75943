//! Domain models for the identity ledger, shop and vouchers.

pub mod catalog;
pub mod credential;
pub mod user;
pub mod verification;
pub mod voucher;

pub use catalog::{CatalogItem, NewCatalogItem, PurchaseOrder, PurchaseRecord};
pub use credential::ApiKey;
pub use user::{
    DiscordIdentity, GameCredentials, GameLink, LinkedAccount, PublicProfile, User,
};
pub use verification::{ExpiryOutOfRange, NewVerificationToken, TokenState, VerificationToken};
pub use voucher::{NewVoucher, RedemptionRecord, Voucher};
