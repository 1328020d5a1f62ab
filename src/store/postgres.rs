//! PostgreSQL Ledger Store
//!
//! Units of work are READ COMMITTED transactions. Balance reads inside a
//! unit of work take a row lock (`SELECT ... FOR UPDATE`), so two debits of
//! the same account serialize their read-modify-write.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{
    AccountHistory, AccountRow, Credentials, InventoryItem, NewOperation, ProductRow,
    TransferRecord,
};

use super::{CredentialStore, LedgerStore, StoreError, UnitOfWork};

/// SQLSTATE raised by `CHECK (balance >= 0)`
const CHECK_VIOLATION: &str = "23514";

/// Ledger store backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new PgLedgerStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Unit of work over one open transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn account_history(&self, username: &str) -> Result<Option<AccountHistory>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // All three reads must observe the same committed state
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let account: Option<(i64, i64)> =
            sqlx::query_as("SELECT id, balance FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((account_id, balance)) = account else {
            return Ok(None);
        };

        let transfers: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT s.username, r.username, o.amount
            FROM operations o
            JOIN users s ON s.id = o.user_id
            JOIN users r ON r.id = o.counterparty_id
            WHERE o.type = 'transfer'
              AND (o.user_id = $1 OR o.counterparty_id = $1)
            ORDER BY o.created_at ASC, o.id ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(&mut *tx)
        .await?;

        let inventory: Vec<(String, i32)> = sqlx::query_as(
            r#"
            SELECT p.name, i.quantity
            FROM inventory i
            JOIN products p ON p.id = i.product_id
            WHERE i.user_id = $1
            ORDER BY p.name ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(AccountHistory {
            balance,
            transfers: transfers
                .into_iter()
                .map(|(sender, recipient, amount)| TransferRecord {
                    sender,
                    recipient,
                    amount,
                })
                .collect(),
            inventory: inventory
                .into_iter()
                .map(|(product, quantity)| InventoryItem { product, quantity })
                .collect(),
        }))
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_account(&mut self, username: &str) -> Result<Option<AccountRow>, StoreError> {
        let row: Option<(i64, String, i64)> = sqlx::query_as(
            r#"
            SELECT id, username, balance
            FROM users
            WHERE username = $1
            FOR UPDATE
            "#,
        )
        .bind(username)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|(id, username, balance)| AccountRow {
            id,
            username,
            balance,
        }))
    }

    async fn read_product(&mut self, name: &str) -> Result<Option<ProductRow>, StoreError> {
        let row: Option<(i64, String, i64)> =
            sqlx::query_as("SELECT id, name, price FROM products WHERE name = $1")
                .bind(name)
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(row.map(|(id, name, price)| ProductRow { id, name, price }))
    }

    async fn adjust_balance(&mut self, account_id: i64, delta: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET balance = balance + $2 WHERE id = $1")
            .bind(account_id)
            .bind(delta)
            .execute(&mut *self.tx)
            .await
            .map_err(|err| match &err {
                sqlx::Error::Database(db_err)
                    if db_err.code().as_deref() == Some(CHECK_VIOLATION) =>
                {
                    StoreError::Invariant(format!(
                        "balance of account {} would become negative",
                        account_id
                    ))
                }
                _ => StoreError::Database(err),
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Invariant(format!(
                "account {} does not exist",
                account_id
            )));
        }

        Ok(())
    }

    async fn upsert_inventory(&mut self, account_id: i64, product_id: i64) -> Result<i32, StoreError> {
        let quantity: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO inventory (user_id, product_id, quantity)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, product_id) DO UPDATE
            SET quantity = inventory.quantity + 1
            RETURNING quantity
            "#,
        )
        .bind(account_id)
        .bind(product_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(quantity)
    }

    async fn append_operation(&mut self, operation: &NewOperation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO operations (id, user_id, amount, type, counterparty_id, product_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(operation.id)
        .bind(operation.actor_id)
        .bind(operation.amount)
        .bind(operation.kind().as_str())
        .bind(operation.counterparty_id())
        .bind(operation.product_id())
        .bind(operation.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgLedgerStore {
    async fn find_credentials(&self, username: &str) -> Result<Option<Credentials>, StoreError> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT id, username, password FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(account_id, username, password_hash)| Credentials {
            account_id,
            username,
            password_hash,
        }))
    }

    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        initial_balance: i64,
    ) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, password, balance)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(initial_balance)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_db(e, || format!("username {} is taken", username)))?;

        Ok(id)
    }
}
