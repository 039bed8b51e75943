//! Voucher code type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`VoucherCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VoucherCodeError {
    /// The input string is empty (after trimming).
    #[error("voucher code cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("voucher code must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `A-Z`, `0-9`, `-` and `_`.
    #[error("voucher code contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A voucher code as typed by a player.
///
/// Codes are case-insensitive: surrounding whitespace is trimmed and the code
/// is stored upper-case, so `" welcome "` and `"WELCOME"` are the same code.
///
/// ## Constraints
///
/// - Length: 1-64 characters after trimming
/// - ASCII letters, digits, `-` and `_` only
///
/// ## Examples
///
/// ```
/// use gamelink_core::VoucherCode;
///
/// assert_eq!(VoucherCode::parse(" welcome ").unwrap().as_str(), "WELCOME");
/// assert!(VoucherCode::parse("").is_err());
/// assert!(VoucherCode::parse("two words").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct VoucherCode(String);

impl VoucherCode {
    /// Maximum length of a voucher code.
    pub const MAX_LENGTH: usize = 64;

    /// Parse and normalize a `VoucherCode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, longer than 64
    /// characters, or contains characters other than ASCII alphanumerics,
    /// `-` and `_`.
    pub fn parse(s: &str) -> Result<Self, VoucherCodeError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(VoucherCodeError::Empty);
        }

        if trimmed.len() > Self::MAX_LENGTH {
            return Err(VoucherCodeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(c) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(VoucherCodeError::InvalidCharacter(c));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the normalized code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the code and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for VoucherCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VoucherCode {
    type Err = VoucherCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VoucherCode {
    type Error = VoucherCodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<VoucherCode> for String {
    fn from(code: VoucherCode) -> Self {
        code.0
    }
}

impl AsRef<str> for VoucherCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        assert_eq!(VoucherCode::parse("welcome").unwrap().as_str(), "WELCOME");
        assert_eq!(
            VoucherCode::parse("  Spring_2026-x ").unwrap().as_str(),
            "SPRING_2026-X"
        );
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(VoucherCode::parse("   "), Err(VoucherCodeError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "A".repeat(65);
        assert!(matches!(
            VoucherCode::parse(&long),
            Err(VoucherCodeError::TooLong { .. })
        ));
        assert!(VoucherCode::parse(&"A".repeat(64)).is_ok());
    }

    #[test]
    fn test_parse_invalid_character() {
        assert_eq!(
            VoucherCode::parse("free;drop"),
            Err(VoucherCodeError::InvalidCharacter(';'))
        );
    }

    #[test]
    fn test_deserialize_normalizes() {
        let code: VoucherCode = serde_json::from_str("\"welcome\"").unwrap();
        assert_eq!(code.as_str(), "WELCOME");
    }
}
