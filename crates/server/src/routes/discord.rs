//! Discord verification routes.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use gamelink_core::{GameAccountId, LinkToken};

use crate::error::{AppError, Result};
use crate::middleware::{RequireAuth, RequireBot};
use crate::models::{DiscordIdentity, NewVerificationToken};
use crate::services::{GameError, LinkingService};
use crate::state::AppState;

/// Token creation request from the bot.
#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    #[serde(default)]
    token: String,
    #[serde(default)]
    discord_id: String,
    #[serde(default)]
    discord_username: String,
    #[serde(default)]
    expires_in_minutes: Option<i64>,
}

/// Success flag.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    success: bool,
}

/// `POST /discord/verification-tokens` (bot only)
///
/// # Errors
///
/// 401 without the bot secret, 400 on missing fields, an out-of-range expiry
/// or a duplicate token.
pub async fn create_token(
    State(state): State<AppState>,
    _bot: RequireBot,
    Json(req): Json<CreateTokenRequest>,
) -> Result<(StatusCode, Json<SuccessResponse>)> {
    let discord_id = req.discord_id.trim();
    let discord_username = req.discord_username.trim();
    if req.token.is_empty() || discord_id.is_empty() || discord_username.is_empty() {
        return Err(AppError::BadRequest(
            "token, discord_id and discord_username are required".to_string(),
        ));
    }
    let token = LinkToken::parse(&req.token)
        .map_err(|e| AppError::BadRequest(format!("Invalid token: {e}")))?;

    let new = NewVerificationToken::expiring(
        token,
        DiscordIdentity {
            discord_id: discord_id.to_owned(),
            discord_username: discord_username.to_owned(),
        },
        req.expires_in_minutes,
        Utc::now(),
    )
    .map_err(|e| AppError::BadRequest(e.to_string()))?;

    LinkingService::new(
        state.users(),
        state.tokens(),
        state.gateway(),
        state.notifier(),
    )
    .issue_token(&new)
    .await?;

    Ok((StatusCode::CREATED, Json(SuccessResponse { success: true })))
}

/// Query string of the verify call.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    token: Option<String>,
}

/// Result of a verified link.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    success: bool,
    message: &'static str,
    game_account_id: GameAccountId,
    discord_linked: bool,
}

/// `POST /discord/verify?token=...`
///
/// # Errors
///
/// 400 without a token, 404/409/410 for unknown, used or expired tokens,
/// 409 if the caller is already linked.
pub async fn verify(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>> {
    let raw = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing token".to_string()))?;
    let token = LinkToken::parse(&raw).map_err(|_| GameError::InvalidToken)?;

    let link = LinkingService::new(
        state.users(),
        state.tokens(),
        state.gateway(),
        state.notifier(),
    )
    .link_via_verification(caller.user_id, &token, Utc::now())
    .await?;

    Ok(Json(VerifyResponse {
        success: true,
        message: "Game account created and Discord verified",
        game_account_id: link.game_account_id,
        discord_linked: true,
    }))
}
