//! Discord verification tokens.

use chrono::{DateTime, Duration, Utc};

use gamelink_core::{LinkToken, UserId};

use super::user::DiscordIdentity;

/// Expiry applied when the bot does not ask for a positive one.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 15;

/// A requested expiry that cannot be represented as a timestamp.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("expires_in_minutes {0} is out of range")]
pub struct ExpiryOutOfRange(pub i64);

/// Lifecycle state of a token at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Unused and not yet expired.
    Pending,
    /// Consumed by a successful link.
    Used,
    /// Past its expiry without being used.
    Expired,
}

/// A single-use token binding a Discord identity to a pending link.
#[derive(Debug, Clone)]
pub struct VerificationToken {
    /// Bearer value.
    pub token: LinkToken,
    /// Discord identity the bot verified.
    pub discord: DiscordIdentity,
    /// Consumption deadline (exclusive).
    pub expires_at: DateTime<Utc>,
    /// Whether the token has been consumed.
    pub used: bool,
    /// Who consumed it.
    pub used_by: Option<UserId>,
    /// When it was created.
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    /// State of the token at `now`. A used token stays `Used` after expiry.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.used {
            TokenState::Used
        } else if now >= self.expires_at {
            TokenState::Expired
        } else {
            TokenState::Pending
        }
    }
}

/// A token as requested by the bot.
#[derive(Debug, Clone)]
pub struct NewVerificationToken {
    /// Bearer value chosen by the bot.
    pub token: LinkToken,
    /// Discord identity being verified.
    pub discord: DiscordIdentity,
    /// Consumption deadline.
    pub expires_at: DateTime<Utc>,
}

impl NewVerificationToken {
    /// Build a token expiring `expires_in_minutes` after `now`, falling back to
    /// the default TTL when the value is missing or not positive.
    ///
    /// # Errors
    ///
    /// Returns `ExpiryOutOfRange` if the expiry does not fit in a timestamp.
    pub fn expiring(
        token: LinkToken,
        discord: DiscordIdentity,
        expires_in_minutes: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Self, ExpiryOutOfRange> {
        let minutes = expires_in_minutes
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_TOKEN_TTL_MINUTES);
        let expires_at = Duration::try_minutes(minutes)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(ExpiryOutOfRange(minutes))?;

        Ok(Self {
            token,
            discord,
            expires_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn discord() -> DiscordIdentity {
        DiscordIdentity {
            discord_id: "123456789".to_string(),
            discord_username: "player#0001".to_string(),
        }
    }

    fn token_with(expires_at: DateTime<Utc>, used: bool) -> VerificationToken {
        VerificationToken {
            token: LinkToken::parse("tok-1").unwrap(),
            discord: discord(),
            expires_at,
            used,
            used_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_default_ttl_when_missing_or_non_positive() {
        let now = Utc::now();
        for minutes in [None, Some(0), Some(-10)] {
            let new = NewVerificationToken::expiring(
                LinkToken::parse("tok").unwrap(),
                discord(),
                minutes,
                now,
            )
            .unwrap();
            assert_eq!(new.expires_at - now, Duration::minutes(15));
        }
    }

    #[test]
    fn test_custom_ttl() {
        let now = Utc::now();
        let new =
            NewVerificationToken::expiring(LinkToken::parse("tok").unwrap(), discord(), Some(5), now)
                .unwrap();
        assert_eq!(new.expires_at - now, Duration::minutes(5));
    }

    #[test]
    fn test_ttl_longer_than_a_day_is_kept() {
        let now = Utc::now();
        let new = NewVerificationToken::expiring(
            LinkToken::parse("tok").unwrap(),
            discord(),
            Some(2880),
            now,
        )
        .unwrap();
        assert_eq!(new.expires_at - now, Duration::minutes(2880));
    }

    #[test]
    fn test_unrepresentable_ttl_is_rejected() {
        let result = NewVerificationToken::expiring(
            LinkToken::parse("tok").unwrap(),
            discord(),
            Some(i64::MAX),
            Utc::now(),
        );
        assert_eq!(result.unwrap_err(), ExpiryOutOfRange(i64::MAX));
    }

    #[test]
    fn test_state_transitions() {
        let now = Utc::now();
        assert_eq!(
            token_with(now + Duration::minutes(1), false).state_at(now),
            TokenState::Pending
        );
        assert_eq!(token_with(now, false).state_at(now), TokenState::Expired);
        assert_eq!(
            token_with(now - Duration::minutes(1), true).state_at(now),
            TokenState::Used
        );
    }
}
