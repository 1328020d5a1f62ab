//! Ledger Error Types
//!
//! The closed error taxonomy surfaced by the transaction engine,
//! the summary service and the identity service.

use thiserror::Error;

use crate::cache::CacheError;
use crate::store::StoreError;

/// Failures of ledger operations.
///
/// Business-rule failures are expected outcomes: they are detected inside a
/// unit of work, which is rolled back before the error is returned. Callers
/// tell them apart from `Internal` and `Cancelled` by matching on the variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Referenced account (sender, recipient or buyer) does not exist
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Referenced product does not exist
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Balance below the required amount at validation time
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Sender and recipient are the same account
    #[error("Cannot transfer coins to yourself")]
    SelfTransfer,

    /// Amount is zero or negative
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    /// The caller cancelled the operation; nothing was committed
    #[error("Operation cancelled")]
    Cancelled,

    /// Unexpected store failure, constraint violation or bug
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(required: i64, available: i64) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Check if this is a business-rule failure (caller's fault, state untouched)
    pub fn is_business_error(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_)
                | Self::ProductNotFound(_)
                | Self::InsufficientFunds { .. }
                | Self::SelfTransfer
                | Self::InvalidAmount(_)
        )
    }

    /// Check if this is an identity-layer failure
    pub fn is_identity_error(&self) -> bool {
        matches!(self, Self::InvalidCredentials | Self::InvalidToken)
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<CacheError> for LedgerError {
    fn from(err: CacheError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<super::CoinsError> for LedgerError {
    fn from(err: super::CoinsError) -> Self {
        Self::InvalidAmount(err.to_string())
    }
}
