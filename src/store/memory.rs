//! In-memory Ledger Store
//!
//! A unit of work takes an exclusive lock over the whole ledger and stages
//! its writes on a copy, which replaces the ledger on commit. Units of work
//! are therefore fully serialized, and dropping one discards its writes.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{
    AccountHistory, AccountRow, Credentials, InventoryItem, NewOperation, OperationDetail,
    ProductRow, TransferRecord,
};

use super::{CredentialStore, LedgerStore, StoreError, UnitOfWork};

#[derive(Debug, Clone)]
struct StoredAccount {
    id: i64,
    username: String,
    password_hash: String,
    balance: i64,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    accounts: BTreeMap<i64, StoredAccount>,
    products: BTreeMap<i64, ProductRow>,
    inventory: BTreeMap<(i64, i64), i32>,
    operations: Vec<NewOperation>,
    next_account_id: i64,
    next_product_id: i64,
}

impl LedgerState {
    fn account(&self, username: &str) -> Option<&StoredAccount> {
        self.accounts.values().find(|a| a.username == username)
    }

    fn username_of(&self, account_id: i64) -> Result<&str, StoreError> {
        self.accounts
            .get(&account_id)
            .map(|a| a.username.as_str())
            .ok_or_else(|| StoreError::Invariant(format!("account {} does not exist", account_id)))
    }

    fn insert_account(
        &mut self,
        username: &str,
        password_hash: &str,
        balance: i64,
    ) -> Result<i64, StoreError> {
        if self.account(username).is_some() {
            return Err(StoreError::Conflict(format!("username {} is taken", username)));
        }
        if balance < 0 {
            return Err(StoreError::Invariant("initial balance is negative".to_string()));
        }

        self.next_account_id += 1;
        let id = self.next_account_id;
        self.accounts.insert(
            id,
            StoredAccount {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                balance,
            },
        );
        Ok(id)
    }

    fn inventory_of(&self, account_id: i64) -> Vec<InventoryItem> {
        let mut items: Vec<InventoryItem> = self
            .inventory
            .iter()
            .filter(|((owner, _), _)| *owner == account_id)
            .filter_map(|((_, product_id), quantity)| {
                self.products.get(product_id).map(|p| InventoryItem {
                    product: p.name.clone(),
                    quantity: *quantity,
                })
            })
            .collect();
        items.sort_by(|a, b| a.product.cmp(&b.product));
        items
    }
}

/// Process-local ledger store
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account without credentials
    pub async fn seed_account(&self, username: &str, balance: i64) -> Result<i64, StoreError> {
        self.state.lock().await.insert_account(username, "", balance)
    }

    /// Add a catalog product
    pub async fn seed_product(&self, name: &str, price: i64) -> Result<i64, StoreError> {
        let mut state = self.state.lock().await;
        if state.products.values().any(|p| p.name == name) {
            return Err(StoreError::Conflict(format!("product {} exists", name)));
        }

        state.next_product_id += 1;
        let id = state.next_product_id;
        state.products.insert(
            id,
            ProductRow {
                id,
                name: name.to_string(),
                price,
            },
        );
        Ok(id)
    }

    /// Seed the standard merch catalog
    pub async fn seed_catalog(&self) -> Result<(), StoreError> {
        for (name, price) in DEFAULT_CATALOG {
            self.seed_product(name, *price).await?;
        }
        Ok(())
    }

    /// Committed balance of an account
    pub async fn balance(&self, username: &str) -> Option<i64> {
        self.state.lock().await.account(username).map(|a| a.balance)
    }

    /// Committed operation log, oldest first
    pub async fn operations(&self) -> Vec<NewOperation> {
        self.state.lock().await.operations.clone()
    }

    /// Committed inventory of an account, ordered by product name
    pub async fn inventory(&self, username: &str) -> Vec<InventoryItem> {
        let state = self.state.lock().await;
        match state.account(username) {
            Some(account) => state.inventory_of(account.id),
            None => Vec::new(),
        }
    }
}

/// Merch catalog seeded by `migrations/0001_init.sql`
pub const DEFAULT_CATALOG: &[(&str, i64)] = &[
    ("t-shirt", 80),
    ("cup", 20),
    ("book", 50),
    ("pen", 10),
    ("powerbank", 200),
    ("hoody", 300),
    ("umbrella", 200),
    ("socks", 10),
    ("wallet", 50),
    ("pink-hoody", 500),
];

/// Unit of work holding the ledger lock
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<LedgerState>,
    staged: LedgerState,
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, staged }))
    }

    async fn account_history(&self, username: &str) -> Result<Option<AccountHistory>, StoreError> {
        let state = self.state.lock().await;

        let Some(account) = state.account(username) else {
            return Ok(None);
        };

        let mut transfers = Vec::new();
        for op in &state.operations {
            if let OperationDetail::Transfer { counterparty_id } = op.detail {
                if op.actor_id == account.id || counterparty_id == account.id {
                    transfers.push(TransferRecord {
                        sender: state.username_of(op.actor_id)?.to_string(),
                        recipient: state.username_of(counterparty_id)?.to_string(),
                        amount: op.amount,
                    });
                }
            }
        }

        Ok(Some(AccountHistory {
            balance: account.balance,
            transfers,
            inventory: state.inventory_of(account.id),
        }))
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_account(&mut self, username: &str) -> Result<Option<AccountRow>, StoreError> {
        Ok(self.staged.account(username).map(|a| AccountRow {
            id: a.id,
            username: a.username.clone(),
            balance: a.balance,
        }))
    }

    async fn read_product(&mut self, name: &str) -> Result<Option<ProductRow>, StoreError> {
        Ok(self.staged.products.values().find(|p| p.name == name).cloned())
    }

    async fn adjust_balance(&mut self, account_id: i64, delta: i64) -> Result<(), StoreError> {
        let account = self
            .staged
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::Invariant(format!("account {} does not exist", account_id)))?;

        let balance = account.balance.checked_add(delta).ok_or(StoreError::Overflow)?;
        if balance < 0 {
            return Err(StoreError::Invariant(format!(
                "balance of account {} would become negative",
                account_id
            )));
        }

        account.balance = balance;
        Ok(())
    }

    async fn upsert_inventory(&mut self, account_id: i64, product_id: i64) -> Result<i32, StoreError> {
        if !self.staged.products.contains_key(&product_id) {
            return Err(StoreError::Invariant(format!("product {} does not exist", product_id)));
        }

        let quantity = self.staged.inventory.entry((account_id, product_id)).or_insert(0);
        *quantity = quantity.checked_add(1).ok_or(StoreError::Overflow)?;
        Ok(*quantity)
    }

    async fn append_operation(&mut self, operation: &NewOperation) -> Result<(), StoreError> {
        self.staged.username_of(operation.actor_id)?;
        if let Some(counterparty_id) = operation.counterparty_id() {
            self.staged.username_of(counterparty_id)?;
        }

        self.staged.operations.push(operation.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InMemoryLedgerStore {
    async fn find_credentials(&self, username: &str) -> Result<Option<Credentials>, StoreError> {
        Ok(self.state.lock().await.account(username).map(|a| Credentials {
            account_id: a.id,
            username: a.username.clone(),
            password_hash: a.password_hash.clone(),
        }))
    }

    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        initial_balance: i64,
    ) -> Result<i64, StoreError> {
        self.state
            .lock()
            .await
            .insert_account(username, password_hash, initial_balance)
    }
}
