//! Verification token values.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`LinkToken`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkTokenError {
    /// The token is empty.
    #[error("token cannot be empty")]
    Empty,
    /// The token is too long.
    #[error("token must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The token contains whitespace or control characters.
    #[error("token contains invalid characters")]
    InvalidCharacters,
}

/// Bearer value of a Discord verification token.
///
/// The token is generated by the bot and handed to the player, who presents it
/// back when completing the link. Anyone holding it can complete the link, so
/// `Debug` only shows a short prefix.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct LinkToken(String);

impl LinkToken {
    /// Maximum length of a token.
    pub const MAX_LENGTH: usize = 128;

    /// Parse a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty, longer than 128 characters, or
    /// contains whitespace or control characters.
    pub fn parse(s: &str) -> Result<Self, LinkTokenError> {
        if s.is_empty() {
            return Err(LinkTokenError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(LinkTokenError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(LinkTokenError::InvalidCharacters);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LinkToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(4).collect();
        write!(f, "LinkToken({prefix}…)")
    }
}

impl TryFrom<String> for LinkToken {
    type Error = LinkTokenError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<LinkToken> for String {
    fn from(token: LinkToken) -> Self {
        token.0
    }
}
