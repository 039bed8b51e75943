//! Admin user management.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gamelink_core::{Coins, GameAccountId, Role, UserId};

use super::game::MessageResponse;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::User;
use crate::services::AccountService;
use crate::state::AppState;

/// A user as shown to admins. Never carries the game login key.
#[derive(Debug, Serialize)]
pub struct AdminUserView {
    user_id: UserId,
    username: String,
    email: String,
    role: Role,
    balance: Coins,
    game_account_id: Option<GameAccountId>,
    discord_id: Option<String>,
    discord_username: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<User> for AdminUserView {
    fn from(user: User) -> Self {
        let (discord_id, discord_username) = user
            .discord
            .map(|d| (d.discord_id, d.discord_username))
            .unzip();
        Self {
            user_id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            balance: user.balance,
            game_account_id: user.game.map(|g| g.account_id),
            discord_id,
            discord_username,
            created_at: user.created_at,
        }
    }
}

/// `GET /admin/users`
///
/// # Errors
///
/// 401/403 for non-admins.
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<AdminUserView>>> {
    let users = AccountService::new(state.users()).list_users().await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Role change body.
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    role: String,
}

/// `PUT /admin/users/{user_id}/role`
///
/// # Errors
///
/// 400 for unknown roles, 404 for unknown users.
pub async fn update_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<UserId>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<MessageResponse>> {
    let role: Role = req
        .role
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid role".to_string()))?;

    AccountService::new(state.users())
        .update_role(admin.user_id, user_id, role)
        .await?;
    Ok(MessageResponse::new("Role updated successfully"))
}
