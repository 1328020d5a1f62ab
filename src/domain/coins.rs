//! Coins type
//!
//! Domain primitive for coin amounts moved by a transfer.
//! Amounts are validated at construction time, so a `Coins` value
//! handed to the transaction engine is always strictly positive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A strictly positive number of coins.
///
/// # Example
/// ```
/// use coin_ledger::domain::Coins;
///
/// let coins = Coins::new(100).unwrap();
/// assert_eq!(coins.value(), 100);
/// assert!(Coins::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Coins(i64);

/// Errors that can occur when creating `Coins`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoinsError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(i64),

    #[error("Invalid amount format: {0}")]
    Parse(String),
}

impl Coins {
    /// Create a new amount.
    ///
    /// # Errors
    /// - `CoinsError::NotPositive` if value <= 0
    pub fn new(value: i64) -> Result<Self, CoinsError> {
        if value <= 0 {
            return Err(CoinsError::NotPositive(value));
        }
        Ok(Self(value))
    }

    /// Get the underlying value.
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Negated value, as applied to the debited account.
    pub fn as_debit(&self) -> i64 {
        -self.0
    }

    /// Check whether `balance` covers this amount.
    pub fn is_covered_by(&self, balance: i64) -> bool {
        balance >= self.0
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Coins {
    type Err = CoinsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|e| CoinsError::Parse(e.to_string()))?;
        Coins::new(value)
    }
}

impl TryFrom<i64> for Coins {
    type Error = CoinsError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Coins::new(value)
    }
}

impl From<Coins> for i64 {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}
