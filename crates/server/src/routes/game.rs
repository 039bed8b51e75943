//! Game account routes: linking, credentials, characters, shop and vouchers.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use gamelink_core::{CatalogItemId, Coins, GameAccountId, VoucherCode};

use crate::error::{AppError, Result};
use crate::gateway::Character;
use crate::middleware::RequireAuth;
use crate::services::{
    AccountService, CharacterService, CommerceService, LinkingService, VoucherService,
};
use crate::state::AppState;

/// Game login credentials.
#[derive(Debug, Serialize)]
pub struct CredentialsResponse {
    username: String,
    api_key: String,
    game_account_id: GameAccountId,
}

/// `GET /game/credentials`
///
/// # Errors
///
/// 403 `account_not_linked` if the caller has no game account.
pub async fn credentials(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
) -> Result<Json<CredentialsResponse>> {
    let creds = AccountService::new(state.users())
        .credentials(caller.user_id)
        .await?;

    Ok(Json(CredentialsResponse {
        username: creds.username,
        api_key: creds.api_key.expose().to_owned(),
        game_account_id: creds.game_account_id,
    }))
}

/// `GET /game/characters`
///
/// # Errors
///
/// 403 if unlinked, 502 if the game store fails.
pub async fn characters(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
) -> Result<Json<Vec<Character>>> {
    let characters = CharacterService::new(state.users(), state.gateway())
        .list(caller.user_id)
        .await?;
    Ok(Json(characters))
}

/// Result of creating and linking a game account.
#[derive(Debug, Serialize)]
pub struct LinkResponse {
    success: bool,
    message: &'static str,
    game_account_id: GameAccountId,
}

/// `POST /game/verify`: create a game account named after the caller.
///
/// # Errors
///
/// 409 if already linked, 502 if the game store refuses the account.
pub async fn link_direct(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
) -> Result<Json<LinkResponse>> {
    let game_account_id = LinkingService::new(
        state.users(),
        state.tokens(),
        state.gateway(),
        state.notifier(),
    )
    .link_direct(caller.user_id)
    .await?;

    Ok(Json(LinkResponse {
        success: true,
        message: "Game account created",
        game_account_id,
    }))
}

/// Unstuck request body.
#[derive(Debug, Deserialize)]
pub struct UnstuckRequest {
    character_name: String,
}

/// Plain message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

impl MessageResponse {
    pub(crate) fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// `POST /game/unstuck`
///
/// # Errors
///
/// 400 on an empty name, 404 if the character is not the caller's.
pub async fn unstuck(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Json(req): Json<UnstuckRequest>,
) -> Result<Json<MessageResponse>> {
    let name = req.character_name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(
            "character_name is required".to_string(),
        ));
    }

    let character = CharacterService::new(state.users(), state.gateway())
        .unstuck(caller.user_id, name)
        .await?;

    Ok(MessageResponse::new(format!(
        "{} has been moved to town.",
        character.name
    )))
}

/// Purchase request body.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    item_id: CatalogItemId,
    #[serde(default = "default_quantity")]
    quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// Result of a purchase.
#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    success: bool,
    message: &'static str,
    new_balance: Coins,
}

/// `POST /game/purchase`
///
/// # Errors
///
/// 402 on insufficient balance, 404 for unknown items, 502 if delivery fails
/// after the deduction.
pub async fn purchase(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>> {
    let receipt = CommerceService::new(state.users(), state.catalog(), state.gateway())
        .purchase(caller.user_id, req.item_id, req.quantity)
        .await?;

    Ok(Json(PurchaseResponse {
        success: true,
        message: "Item purchased successfully",
        new_balance: receipt.new_balance,
    }))
}

/// Redeem request body.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    code: String,
}

/// Result of a redemption.
#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    success: bool,
    message: &'static str,
}

/// `POST /game/redeem`
///
/// # Errors
///
/// 404 for unknown codes, 409 if already redeemed or exhausted.
pub async fn redeem(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>> {
    let code = VoucherCode::parse(&req.code)
        .map_err(|e| AppError::BadRequest(format!("Invalid voucher code: {e}")))?;

    VoucherService::new(state.users(), state.vouchers(), state.gateway())
        .redeem(caller.user_id, &code)
        .await?;

    Ok(Json(RedeemResponse {
        success: true,
        message: "Voucher redeemed successfully",
    }))
}
