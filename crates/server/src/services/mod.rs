//! Business logic services.

pub mod accounts;
pub mod characters;
pub mod commerce;
pub mod error;
pub mod identity;
pub mod linking;
pub mod notify;
pub mod vouchers;

pub use accounts::AccountService;
pub use characters::CharacterService;
pub use commerce::{CommerceService, PurchaseReceipt};
pub use error::{ErrorClass, GameError};
pub use identity::{CallerIdentity, IdentityError, TokenVerifier};
pub use linking::{LinkingService, VerifiedLink};
pub use notify::{BotNotifier, LinkNotification, NotifyError, WebhookNotifier};
pub use vouchers::{RedemptionReceipt, VoucherService};
