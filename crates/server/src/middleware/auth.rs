//! Authentication extractors.
//!
//! Players and admins present a bearer token issued by the central auth
//! service; the Discord bot presents the shared secret in `X-Bot-Secret`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use secrecy::ExposeSecret;

use crate::error::{AppError, set_sentry_user};
use crate::services::CallerIdentity;
use crate::services::identity::bearer_token;
use crate::services::notify::BOT_SECRET_HEADER;
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAuth(caller): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", caller.username)
/// }
/// ```
pub struct RequireAuth(pub CallerIdentity);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing access token".to_string()))?;

        let token = bearer_token(header)
            .ok_or_else(|| AppError::Unauthorized("Malformed authorization header".to_string()))?;

        let caller = state.verifier().verify(token)?;
        set_sentry_user(&caller.user_id, &caller.username);
        tracing::Span::current().record("user_id", tracing::field::display(caller.user_id));

        Ok(Self(caller))
    }
}

/// Extractor that requires a bearer token carrying the admin role.
pub struct RequireAdmin(pub CallerIdentity);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(caller) = RequireAuth::from_request_parts(parts, state).await?;

        if !caller.role.is_admin() {
            tracing::warn!(user_id = %caller.user_id, role = %caller.role, "admin access denied");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        Ok(Self(caller))
    }
}

/// Extractor that requires the Discord bot's shared secret.
pub struct RequireBot;

impl FromRequestParts<AppState> for RequireBot {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(BOT_SECRET_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing bot secret".to_string()))?;

        if !constant_time_compare(presented, state.bot_secret().expose_secret()) {
            tracing::warn!("invalid bot secret presented");
            return Err(AppError::Unauthorized("Invalid bot secret".to_string()));
        }

        Ok(Self)
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
