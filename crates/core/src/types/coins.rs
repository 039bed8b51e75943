//! In-game currency amounts.
//!
//! Balances and prices share one unit and are whole, non-negative numbers.
//! They are stored as `BIGINT` in `PostgreSQL`, so the inner value is an `i64`
//! that is never negative.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing or combining [`Coins`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinsError {
    /// The amount is below zero.
    #[error("amount cannot be negative (got {0})")]
    Negative(i64),
    /// Multiplying the amount overflowed.
    #[error("amount overflow")]
    Overflow,
}

/// A non-negative amount of in-game currency.
///
/// ```
/// use gamelink_core::Coins;
///
/// let price = Coins::new(300).unwrap();
/// assert_eq!(price.checked_times(3).unwrap(), Coins::new(900).unwrap());
/// assert!(Coins::new(-1).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Coins(i64);

impl Coins {
    /// Zero coins.
    pub const ZERO: Self = Self(0);

    /// Create an amount, rejecting negative values.
    ///
    /// # Errors
    ///
    /// Returns `CoinsError::Negative` if `amount < 0`.
    pub const fn new(amount: i64) -> Result<Self, CoinsError> {
        if amount < 0 {
            return Err(CoinsError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Get the raw amount.
    #[must_use]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Multiply by a quantity, failing on overflow.
    ///
    /// # Errors
    ///
    /// Returns `CoinsError::Overflow` if the product does not fit in an `i64`.
    pub fn checked_times(self, quantity: u32) -> Result<Self, CoinsError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Self)
            .ok_or(CoinsError::Overflow)
    }

    /// Add another amount, failing on overflow.
    ///
    /// # Errors
    ///
    /// Returns `CoinsError::Overflow` if the sum does not fit in an `i64`.
    pub fn checked_add(self, other: Self) -> Result<Self, CoinsError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(CoinsError::Overflow)
    }

    /// Subtract another amount, returning `None` if the result would be negative.
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        if other.0 > self.0 {
            return None;
        }
        Some(Self(self.0 - other.0))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Coins {
    type Error = CoinsError;

    fn try_from(amount: i64) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Coins> for i64 {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Coins {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Coins {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Coins {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
