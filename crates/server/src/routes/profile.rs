//! Public profiles and profile updates.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use gamelink_core::UserId;

use super::game::MessageResponse;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::PublicProfile;
use crate::services::AccountService;
use crate::state::AppState;

/// `GET /profile/{user_id}`
///
/// # Errors
///
/// 404 if the user does not exist.
pub async fn show(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<PublicProfile>> {
    let profile = AccountService::new(state.users()).profile(user_id).await?;
    Ok(Json(profile))
}

/// Profile update body.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    profile_image: String,
}

/// `PUT /profile`
///
/// # Errors
///
/// 400 unless the image is one of the stock avatars.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<MessageResponse>> {
    AccountService::new(state.users())
        .update_profile_image(caller.user_id, &req.profile_image)
        .await?;
    Ok(MessageResponse::new("Profile updated successfully"))
}
