//! Caller identity from bearer tokens issued by the central auth service.
//!
//! This service never issues tokens; it only verifies them and reads the
//! stable user ID, username and role out of the claims.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gamelink_core::{Role, UserId};

use crate::config::JwtConfig;

/// Errors that can occur when verifying a caller token.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Token signature, structure or claims are invalid.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// Token is past its expiry.
    #[error("token expired")]
    Expired,

    /// Verification key could not be loaded.
    #[error("invalid verification key: {0}")]
    Key(String),
}

/// Claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Stable user ID.
    #[serde(alias = "sub")]
    pub user_id: UserId,
    /// Username at issue time.
    #[serde(default)]
    pub username: String,
    /// Role at issue time.
    #[serde(default)]
    pub role: Role,
    /// Expiry (seconds since epoch).
    pub exp: u64,
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Stable user ID.
    pub user_id: UserId,
    /// Username at issue time.
    pub username: String,
    /// Role at issue time.
    pub role: Role,
}

impl From<Claims> for CallerIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// Verifies access tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Build a verifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Key` if the RS256 public key is not valid PEM.
    pub fn new(config: &JwtConfig) -> Result<Self, IdentityError> {
        let (key, algorithm) = match config {
            JwtConfig::Rs256 { public_key_pem } => (
                DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
                    .map_err(|e| IdentityError::Key(e.to_string()))?,
                Algorithm::RS256,
            ),
            JwtConfig::Hs256 { secret } => (
                DecodingKey::from_secret(secret.expose_secret().as_bytes()),
                Algorithm::HS256,
            ),
        };

        Ok(Self {
            key,
            validation: Validation::new(algorithm),
        })
    }

    /// Verify a token and return the caller.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Expired` for expired tokens and
    /// `IdentityError::Invalid` for anything else that fails validation.
    pub fn verify(&self, token: &str) -> Result<CallerIdentity, IdentityError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims.into())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => IdentityError::Expired,
                _ => IdentityError::Invalid(e.to_string()),
            })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
