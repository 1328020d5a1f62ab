//! Ledger Store module
//!
//! Storage capabilities consumed by the transaction engine, the summary
//! service and the identity service. PostgreSQL is the production backend;
//! the in-memory backend is used by tests and the `STORAGE=memory` mode.

mod error;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::domain::{AccountHistory, AccountRow, Credentials, NewOperation, ProductRow};

pub use error::StoreError;
pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Durable source of truth for balances, inventory and the operation log.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Begin an atomic, isolated unit of work
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Read balance, transfer history and inventory of one account from a
    /// single consistent snapshot. `None` if the account does not exist.
    async fn account_history(&self, username: &str) -> Result<Option<AccountHistory>, StoreError>;
}

/// One atomic group of ledger mutations.
///
/// Dropping a unit of work without calling `commit` discards every write
/// made through it.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Read an account and lock its row until commit or rollback
    async fn lock_account(&mut self, username: &str) -> Result<Option<AccountRow>, StoreError>;

    /// Read a catalog product
    async fn read_product(&mut self, name: &str) -> Result<Option<ProductRow>, StoreError>;

    /// Add `delta` (possibly negative) to an account balance
    async fn adjust_balance(&mut self, account_id: i64, delta: i64) -> Result<(), StoreError>;

    /// Insert an inventory line with quantity 1 or increment the existing one.
    /// Returns the quantity after the upsert.
    async fn upsert_inventory(&mut self, account_id: i64, product_id: i64) -> Result<i32, StoreError>;

    /// Append an immutable operation record
    async fn append_operation(&mut self, operation: &NewOperation) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Account credentials storage used by the identity service.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_credentials(&self, username: &str) -> Result<Option<Credentials>, StoreError>;

    /// Create an account. Fails with `StoreError::Conflict` if the username is taken.
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        initial_balance: i64,
    ) -> Result<i64, StoreError>;
}
