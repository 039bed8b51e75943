//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::SecretString;
use sqlx::PgPool;

use crate::db::{
    PgCatalogRepository, PgUserRepository, PgVerificationRepository, PgVoucherRepository,
};
use crate::gateway::GameGateway;
use crate::services::{BotNotifier, TokenVerifier};
use crate::store::{CatalogStore, UserStore, VerificationStore, VoucherStore};

/// The four storage seams, bundled.
#[derive(Clone)]
pub struct Stores {
    /// Identity ledger.
    pub users: Arc<dyn UserStore>,
    /// Verification tokens.
    pub tokens: Arc<dyn VerificationStore>,
    /// Shop catalog.
    pub catalog: Arc<dyn CatalogStore>,
    /// Vouchers and redemptions.
    pub vouchers: Arc<dyn VoucherStore>,
}

impl Stores {
    /// `PostgreSQL`-backed stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            tokens: Arc::new(PgVerificationRepository::new(pool.clone())),
            catalog: Arc::new(PgCatalogRepository::new(pool.clone())),
            vouchers: Arc::new(PgVoucherRepository::new(pool.clone())),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    stores: Stores,
    gateway: Arc<dyn GameGateway>,
    notifier: Arc<dyn BotNotifier>,
    verifier: TokenVerifier,
    bot_secret: SecretString,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        stores: Stores,
        gateway: Arc<dyn GameGateway>,
        notifier: Arc<dyn BotNotifier>,
        verifier: TokenVerifier,
        bot_secret: SecretString,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                stores,
                gateway,
                notifier,
                verifier,
                bot_secret,
            }),
        }
    }

    /// Identity ledger.
    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.inner.stores.users.as_ref()
    }

    /// Verification tokens.
    #[must_use]
    pub fn tokens(&self) -> &dyn VerificationStore {
        self.inner.stores.tokens.as_ref()
    }

    /// Shop catalog.
    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogStore {
        self.inner.stores.catalog.as_ref()
    }

    /// Vouchers and redemptions.
    #[must_use]
    pub fn vouchers(&self) -> &dyn VoucherStore {
        self.inner.stores.vouchers.as_ref()
    }

    /// Game store gateway.
    #[must_use]
    pub fn gateway(&self) -> &dyn GameGateway {
        self.inner.gateway.as_ref()
    }

    /// Bot notification sink.
    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn BotNotifier> {
        &self.inner.notifier
    }

    /// Caller token verifier.
    #[must_use]
    pub fn verifier(&self) -> &TokenVerifier {
        &self.inner.verifier
    }

    /// Shared secret the bot presents.
    #[must_use]
    pub fn bot_secret(&self) -> &SecretString {
        &self.inner.bot_secret
    }
}
