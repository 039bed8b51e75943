//! Test support: in-memory stores, a recording game gateway and notifier,
//! fixture builders and a token signer.
//!
//! Compiled for this crate's unit tests and, through the `test-util` feature,
//! for the integration tests.

mod fakes;
mod memory;

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use secrecy::SecretString;

use gamelink_core::{
    CatalogItemId, CharacterNo, Coins, GameAccountId, GoodsEntry, GoodsId, Role, UserId,
    VoucherCode, VoucherId,
};

pub use fakes::{FakeGateway, RecordingNotifier};
pub use memory::MemoryStore;

use crate::config::JwtConfig;
use crate::gateway::Character;
use crate::models::{ApiKey, CatalogItem, DiscordIdentity, LinkedAccount, User, Voucher};
use crate::services::identity::Claims;
use crate::services::{IdentityError, TokenVerifier};
use crate::state::{AppState, Stores};

/// HS256 secret shared by [`signed_token`] and [`app_state`].
pub const TEST_JWT_SECRET: &str = "k9$Vq2!xR7@mZ4#pL8&nW3*tB6^yC1%d";

/// Bot secret configured by [`app_state`].
pub const TEST_BOT_SECRET: &str = "Zt7#qW2!mK9$vR4&xL8@pN3*hB6^cJ1%";

/// An unlinked user with the given balance.
#[must_use]
pub fn test_user(username: &str, balance: i64) -> User {
    let now = Utc::now();
    User {
        id: UserId::generate(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        role: Role::User,
        balance: Coins::new(balance).unwrap_or(Coins::ZERO),
        game: None,
        discord: None,
        profile_image: None,
        created_at: now,
        updated_at: now,
    }
}

/// A user already linked to `account`.
#[must_use]
pub fn linked_user(username: &str, balance: i64, account: i32) -> User {
    User {
        game: Some(LinkedAccount {
            account_id: GameAccountId::new(account),
            api_key: ApiKey::from_stored(format!("key-{username}")),
        }),
        ..test_user(username, balance)
    }
}

/// The Discord identity used by verification fixtures.
#[must_use]
pub fn discord_identity() -> DiscordIdentity {
    DiscordIdentity {
        discord_id: "123456789".to_string(),
        discord_username: "player#0001".to_string(),
    }
}

fn contents(lines: &[(i32, i32)]) -> Vec<GoodsEntry> {
    lines
        .iter()
        .map(|&(goods, quantity)| GoodsEntry {
            goods_id: GoodsId::new(goods),
            quantity,
        })
        .collect()
}

/// An active catalog item granting `(goods, quantity)` lines per unit.
#[must_use]
pub fn catalog_item(id: i32, price: i64, lines: &[(i32, i32)]) -> CatalogItem {
    CatalogItem {
        id: CatalogItemId::new(id),
        name: format!("Item {id}"),
        description: None,
        price: Coins::new(price).unwrap_or(Coins::ZERO),
        active: true,
        contents: contents(lines),
    }
}

/// An active voucher. The ID is assigned by [`MemoryStore::insert_voucher`].
///
/// # Panics
///
/// Panics if `code` is not a valid voucher code.
#[must_use]
pub fn voucher(code: &str, cap: Option<i32>, lines: &[(i32, i32)]) -> Voucher {
    let code = VoucherCode::parse(code)
        .unwrap_or_else(|e| panic!("invalid voucher code {code:?} in fixture: {e}"));
    Voucher {
        id: VoucherId::new(0),
        code,
        max_total_redemptions: cap,
        active: true,
        contents: contents(lines),
    }
}

/// A level 1 character.
#[must_use]
pub fn character(no: i32, name: &str) -> Character {
    Character {
        char_no: CharacterNo::new(no),
        name: name.to_string(),
        level: 1,
        playtime: 0,
        money: 0,
        class_id: 1,
    }
}

/// Sign an access token for `user` with [`TEST_JWT_SECRET`], valid for an hour.
///
/// # Errors
///
/// Returns error if encoding fails.
pub fn signed_token(user: &User) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = Utc::now().timestamp().unsigned_abs() + 3600;
    let claims = Claims {
        user_id: user.id,
        username: user.username.clone(),
        role: user.role,
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
}

/// Application state over in-memory stores and the given fakes.
///
/// # Errors
///
/// Returns error if the token verifier cannot be built.
pub fn app_state(
    store: &Arc<MemoryStore>,
    gateway: Arc<FakeGateway>,
    notifier: Arc<RecordingNotifier>,
) -> Result<AppState, IdentityError> {
    let stores = Stores {
        users: store.clone(),
        tokens: store.clone(),
        catalog: store.clone(),
        vouchers: store.clone(),
    };
    let verifier = TokenVerifier::new(&JwtConfig::Hs256 {
        secret: SecretString::from(TEST_JWT_SECRET),
    })?;

    Ok(AppState::new(
        stores,
        gateway,
        notifier,
        verifier,
        SecretString::from(TEST_BOT_SECRET),
    ))
}
