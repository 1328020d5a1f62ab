//! Ledger Store Errors

/// Errors that can occur in a ledger store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unique constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Balance or inventory quantity arithmetic overflowed
    #[error("Arithmetic overflow")]
    Overflow,

    /// A store-level invariant would be violated (negative balance, unknown row)
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl StoreError {
    /// Map a database error, turning unique violations into `Conflict`
    pub(crate) fn from_db(err: sqlx::Error, conflict: impl FnOnce() -> String) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Conflict(conflict())
            }
            _ => StoreError::Database(err),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
