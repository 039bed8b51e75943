//! End-to-end API tests over in-memory stores and a fake game gateway.
//!
//! These run without external services.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use gamelink_core::{GameAccountId, GoodsId, LinkToken, Role};
use gamelink_integration_tests::{Caller, TestApp};
use gamelink_server::models::User;
use gamelink_server::store::VerificationStore;
use gamelink_server::testing::{catalog_item, character, linked_user, test_user, voucher};

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_protected_routes_require_a_token() {
    let app = TestApp::new().unwrap();

    for uri in ["/game/credentials", "/game/characters", "/admin/users"] {
        let resp = app.get(uri, Caller::Anonymous).await.unwrap();
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(resp.error_code(), Some("unauthorized"));
    }
}

#[tokio::test]
async fn test_admin_routes_reject_players() {
    let app = TestApp::new().unwrap();
    let player = app.add_user(test_user("player", 0));

    let resp = app.get("/admin/users", Caller::User(&player)).await.unwrap();
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_code(), Some("forbidden"));
}

#[tokio::test]
async fn test_admin_lists_users_without_keys_and_changes_roles() {
    let app = TestApp::new().unwrap();
    let admin = app.add_user(User {
        role: Role::Admin,
        ..test_user("root", 0)
    });
    let player = app.add_user(linked_user("player", 50, 7));

    let resp = app.get("/admin/users", Caller::User(&admin)).await.unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    let users = resp.body.as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("api_key").is_none()));

    let uri = format!("/admin/users/{}/role", player.id);
    let resp = app
        .put(&uri, Caller::User(&admin), json!({"role": "moderator"}))
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .put(&uri, Caller::User(&admin), json!({"role": "emperor"}))
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let profile = app
        .get(&format!("/profile/{}", player.id), Caller::Anonymous)
        .await
        .unwrap();
    assert_eq!(profile.body["role"], "moderator");
}

// ============================================================================
// Direct linking and credentials
// ============================================================================

#[tokio::test]
async fn test_credentials_require_a_linked_account() {
    let app = TestApp::new().unwrap();
    let user = app.add_user(test_user("alice", 0));

    let resp = app.get("/game/credentials", Caller::User(&user)).await.unwrap();
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_code(), Some("account_not_linked"));
}

#[tokio::test]
async fn test_direct_link_then_credentials() {
    let app = TestApp::new().unwrap();
    let user = app.add_user(test_user("alice", 0));

    let resp = app
        .post("/game/verify", Caller::User(&user), Value::Null)
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["success"], true);
    let account = resp.body["game_account_id"].as_i64().unwrap();

    let creds = app.get("/game/credentials", Caller::User(&user)).await.unwrap();
    assert_eq!(creds.status, StatusCode::OK);
    assert_eq!(creds.body["username"], "alice");
    assert_eq!(creds.body["game_account_id"].as_i64(), Some(account));
    assert_eq!(creds.body["api_key"].as_str().unwrap().len(), 16);

    let created = app.gateway.created_accounts();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0, "alice");
    assert_ne!(created[0].1, creds.body["api_key"].as_str().unwrap());

    let again = app
        .post("/game/verify", Caller::User(&user), Value::Null)
        .await
        .unwrap();
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.error_code(), Some("already_linked"));
}

#[tokio::test]
async fn test_gateway_failure_is_a_bad_gateway() {
    let app = TestApp::new().unwrap();
    let user = app.add_user(test_user("alice", 0));
    app.gateway.fail_account_creation();

    let resp = app
        .post("/game/verify", Caller::User(&user), Value::Null)
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::BAD_GATEWAY);

    let creds = app.get("/game/credentials", Caller::User(&user)).await.unwrap();
    assert_eq!(creds.status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Discord verification
// ============================================================================

#[tokio::test]
async fn test_bot_token_creation_requires_the_secret() {
    let app = TestApp::new().unwrap();
    let body = json!({
        "token": "abc123",
        "discord_id": "123456789",
        "discord_username": "player#0001",
    });

    let resp = app
        .post("/discord/verification-tokens", Caller::Anonymous, body.clone())
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .post("/discord/verification-tokens", Caller::Bot, body.clone())
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["success"], true);

    let dup = app
        .post("/discord/verification-tokens", Caller::Bot, body)
        .await
        .unwrap();
    assert_eq!(dup.status, StatusCode::BAD_REQUEST);

    let missing = app
        .post(
            "/discord/verification-tokens",
            Caller::Bot,
            json!({"token": "other"}),
        )
        .await
        .unwrap();
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bot_token_keeps_requested_expiry() {
    let app = TestApp::new().unwrap();
    let token_body = |token: &str, minutes: i64| {
        json!({
            "token": token,
            "discord_id": "123456789",
            "discord_username": "player#0001",
            "expires_in_minutes": minutes,
        })
    };

    let before = Utc::now();
    let resp = app
        .post(
            "/discord/verification-tokens",
            Caller::Bot,
            token_body("two-days", 2880),
        )
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::CREATED);

    let stored = VerificationStore::get(&*app.store, &LinkToken::parse("two-days").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.expires_at >= before + Duration::minutes(2880));
    assert!(stored.expires_at <= Utc::now() + Duration::minutes(2880));

    let resp = app
        .post(
            "/discord/verification-tokens",
            Caller::Bot,
            token_body("forever", i64::MAX),
        )
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_discord_verification_flow() {
    let app = TestApp::new().unwrap();
    let alice = app.add_user(test_user("alice", 0));
    let bob = app.add_user(test_user("bob", 0));

    let resp = app
        .post(
            "/discord/verification-tokens",
            Caller::Bot,
            json!({
                "token": "abc123",
                "discord_id": "123456789",
                "discord_username": "player#0001",
                "expires_in_minutes": 10,
            }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .post("/discord/verify?token=abc123", Caller::User(&alice), Value::Null)
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["discord_linked"], true);
    let account = resp.body["game_account_id"].as_i64().unwrap();

    let sent = app.notifier.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].discord_id, "123456789");
    assert_eq!(i64::from(sent[0].game_account_id.as_i32()), account);
    assert_eq!(app.gateway.created_accounts()[0].0, "player#0001");

    let reused = app
        .post("/discord/verify?token=abc123", Caller::User(&bob), Value::Null)
        .await
        .unwrap();
    assert_eq!(reused.status, StatusCode::CONFLICT);
    assert_eq!(reused.error_code(), Some("token_used"));

    let unknown = app
        .post("/discord/verify?token=nope", Caller::User(&bob), Value::Null)
        .await
        .unwrap();
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.error_code(), Some("invalid_token"));

    let missing = app
        .post("/discord/verify", Caller::User(&bob), Value::Null)
        .await
        .unwrap();
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_linked_user_cannot_verify_again() {
    let app = TestApp::new().unwrap();
    let user = app.add_user(linked_user("alice", 0, 42));

    let resp = app
        .post("/discord/verify?token=whatever", Caller::User(&user), Value::Null)
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_code(), Some("already_linked"));
    assert!(app.gateway.created_accounts().is_empty());
}

// ============================================================================
// Shop
// ============================================================================

#[tokio::test]
async fn test_purchase_deducts_and_grants() {
    let app = TestApp::new().unwrap();
    let user = app.add_user(linked_user("alice", 1000, 42));
    app.store.insert_item(catalog_item(1, 300, &[(5, 2)]));

    let items = app.get("/shop/items", Caller::Anonymous).await.unwrap();
    assert_eq!(items.status, StatusCode::OK);
    assert_eq!(items.body.as_array().unwrap().len(), 1);

    let resp = app
        .post("/game/purchase", Caller::User(&user), json!({"item_id": 1}))
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["new_balance"], 700);
    assert_eq!(
        app.gateway.grants(),
        vec![(GameAccountId::new(42), GoodsId::new(5), 2)]
    );

    let resp = app
        .post(
            "/game/purchase",
            Caller::User(&user),
            json!({"item_id": 1, "quantity": 3}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(resp.error_code(), Some("insufficient_balance"));
    assert_eq!(app.gateway.grants().len(), 1);
}

#[tokio::test]
async fn test_purchase_rejections() {
    let app = TestApp::new().unwrap();
    let unlinked = app.add_user(test_user("bob", 1000));
    let linked = app.add_user(linked_user("alice", 1000, 42));
    app.store.insert_item(catalog_item(1, 300, &[(5, 2)]));

    let resp = app
        .post("/game/purchase", Caller::User(&unlinked), json!({"item_id": 1}))
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .post("/game/purchase", Caller::User(&linked), json!({"item_id": 99}))
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_code(), Some("item_not_found"));

    let resp = app
        .post(
            "/game/purchase",
            Caller::User(&linked),
            json!({"item_id": 1, "quantity": 0}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Vouchers
// ============================================================================

#[tokio::test]
async fn test_voucher_cap_across_users() {
    let app = TestApp::new().unwrap();
    let a = app.add_user(linked_user("a", 0, 1));
    let b = app.add_user(linked_user("b", 0, 2));
    let c = app.add_user(linked_user("c", 0, 3));
    app.store
        .insert_voucher(voucher("WELCOME", Some(2), &[(9, 1), (10, 5)]));

    let resp = app
        .post("/game/redeem", Caller::User(&a), json!({"code": "welcome"}))
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["success"], true);

    let again = app
        .post("/game/redeem", Caller::User(&a), json!({"code": "WELCOME"}))
        .await
        .unwrap();
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.error_code(), Some("already_redeemed"));

    let resp = app
        .post("/game/redeem", Caller::User(&b), json!({"code": "WELCOME"}))
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .post("/game/redeem", Caller::User(&c), json!({"code": "WELCOME"}))
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_code(), Some("redemption_exhausted"));

    assert_eq!(app.gateway.grants().len(), 4);
}

#[tokio::test]
async fn test_unknown_and_malformed_voucher_codes() {
    let app = TestApp::new().unwrap();
    let user = app.add_user(linked_user("a", 0, 1));

    let resp = app
        .post("/game/redeem", Caller::User(&user), json!({"code": "NOPE"}))
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_code(), Some("voucher_not_found"));

    let resp = app
        .post("/game/redeem", Caller::User(&user), json!({"code": "two words"}))
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Characters and profiles
// ============================================================================

#[tokio::test]
async fn test_characters_and_unstuck() {
    let app = TestApp::new().unwrap();
    let user = app.add_user(linked_user("alice", 0, 42));
    app.gateway
        .add_character(GameAccountId::new(42), character(7, "Hero"));

    let resp = app.get("/game/characters", Caller::User(&user)).await.unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body[0]["charNo"], 7);

    let resp = app
        .post(
            "/game/unstuck",
            Caller::User(&user),
            json!({"character_name": "Hero"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["message"], "Hero has been moved to town.");

    let resp = app
        .post(
            "/game/unstuck",
            Caller::User(&user),
            json!({"character_name": "Villain"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_code(), Some("character_not_found"));
}

#[tokio::test]
async fn test_profile_avatar_update() {
    let app = TestApp::new().unwrap();
    let user = app.add_user(test_user("alice", 0));

    let resp = app
        .put(
            "/profile",
            Caller::User(&user),
            json!({"profile_image": "avatar-3.png"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .put(
            "/profile",
            Caller::User(&user),
            json!({"profile_image": "avatar-21.png"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let profile = app
        .get(&format!("/profile/{}", user.id), Caller::Anonymous)
        .await
        .unwrap();
    assert_eq!(profile.body["username"], "alice");
    assert_eq!(profile.body["profile_image"], "avatar-3.png");
}
