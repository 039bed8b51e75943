//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Every error renders as
//! `{"error": code, "message": text}`; server-side and upstream failures are
//! captured to Sentry before responding, and their details never reach the
//! client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{ErrorClass, GameError, IdentityError};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Domain operation failed.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Caller token was rejected.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Storage failed outside a domain operation.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// No usable credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub error: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Game(err) => match (err, err.class()) {
                (GameError::InsufficientBalance, _) => StatusCode::PAYMENT_REQUIRED,
                (GameError::TokenExpired, _) => StatusCode::GONE,
                (_, ErrorClass::Validation) => StatusCode::BAD_REQUEST,
                (_, ErrorClass::StateConflict | ErrorClass::ResourceExhausted) => {
                    StatusCode::CONFLICT
                }
                (_, ErrorClass::NotFound) => StatusCode::NOT_FOUND,
                (_, ErrorClass::NotLinked) => StatusCode::FORBIDDEN,
                (_, ErrorClass::Upstream) => StatusCode::BAD_GATEWAY,
                (_, ErrorClass::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Identity(IdentityError::Key(_)) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Identity(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Game(err) => err.code(),
            Self::Identity(IdentityError::Expired) => "access_token_expired",
            Self::Identity(IdentityError::Key(_)) | Self::Database(_) | Self::Internal(_) => {
                "internal_error"
            }
            Self::Identity(_) | Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::BadRequest(_) => "bad_request",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Game(err) => err.public_message(),
            Self::Identity(IdentityError::Expired) => "Access token has expired".to_string(),
            Self::Identity(IdentityError::Key(_)) | Self::Database(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Identity(_) => "Invalid access token".to_string(),
            Self::Unauthorized(msg) | Self::Forbidden(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors and upstream failures to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorBody {
            error: self.code(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(user_id: &impl ToString, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;

    fn status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_game_error_statuses() {
        assert_eq!(status(GameError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(GameError::AlreadyLinked), StatusCode::CONFLICT);
        assert_eq!(status(GameError::AlreadyRedeemed), StatusCode::CONFLICT);
        assert_eq!(status(GameError::TokenUsed), StatusCode::CONFLICT);
        assert_eq!(status(GameError::TokenExpired), StatusCode::GONE);
        assert_eq!(
            status(GameError::InsufficientBalance),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(status(GameError::RedemptionExhausted), StatusCode::CONFLICT);
        assert_eq!(status(GameError::VoucherNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(GameError::InvalidToken), StatusCode::NOT_FOUND);
        assert_eq!(status(GameError::NotLinked), StatusCode::FORBIDDEN);
        assert_eq!(
            status(GameError::Gateway(GatewayError::Rejected("x".into()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(GameError::Repository(RepositoryError::NotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_identity_statuses() {
        assert_eq!(status(IdentityError::Expired), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(IdentityError::Invalid("bad".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(IdentityError::Key("bad pem".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_codes_and_messages() {
        let err = AppError::from(GameError::NotLinked);
        assert_eq!(err.code(), "account_not_linked");

        let err = AppError::Internal("pool exhausted".into());
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(AppError::Forbidden("Admin access required".into()).code(), "forbidden");
    }

    #[test]
    fn test_expired_codes_are_distinct() {
        let access = AppError::from(IdentityError::Expired);
        let link = AppError::from(GameError::TokenExpired);
        assert_eq!(access.code(), "access_token_expired");
        assert_eq!(link.code(), "token_expired");
    }
}
