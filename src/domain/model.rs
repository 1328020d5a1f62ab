//! Ledger Records
//!
//! Rows read from and written to the ledger store.
//! Accounts and products are identified by database ids inside a unit of
//! work and by their unique names everywhere else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account row as seen inside a unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    pub id: i64,
    pub username: String,
    pub balance: i64,
}

/// Catalog product row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub price: i64,
}

/// Stored credentials of an account
#[derive(Debug, Clone)]
pub struct Credentials {
    pub account_id: i64,
    pub username: String,
    pub password_hash: String,
}

/// Kind of a ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Transfer,
    Purchase,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Transfer => "transfer",
            OperationKind::Purchase => "purchase",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind-specific part of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationDetail {
    /// Coins sent to another account
    Transfer { counterparty_id: i64 },
    /// Coins spent on a catalog product
    Purchase { product_id: i64 },
}

/// Operation about to be appended to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOperation {
    pub id: Uuid,
    pub actor_id: i64,
    pub amount: i64,
    pub detail: OperationDetail,
    pub created_at: DateTime<Utc>,
}

impl NewOperation {
    /// Transfer of `amount` from `actor_id` to `counterparty_id`
    pub fn transfer(actor_id: i64, counterparty_id: i64, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            amount,
            detail: OperationDetail::Transfer { counterparty_id },
            created_at: Utc::now(),
        }
    }

    /// Purchase of `product_id` by `actor_id` for `price`
    pub fn purchase(actor_id: i64, product_id: i64, price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            amount: price,
            detail: OperationDetail::Purchase { product_id },
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self.detail {
            OperationDetail::Transfer { .. } => OperationKind::Transfer,
            OperationDetail::Purchase { .. } => OperationKind::Purchase,
        }
    }

    pub fn counterparty_id(&self) -> Option<i64> {
        match self.detail {
            OperationDetail::Transfer { counterparty_id } => Some(counterparty_id),
            OperationDetail::Purchase { .. } => None,
        }
    }

    pub fn product_id(&self) -> Option<i64> {
        match self.detail {
            OperationDetail::Purchase { product_id } => Some(product_id),
            OperationDetail::Transfer { .. } => None,
        }
    }
}

/// Transfer-kind operation with both parties resolved to usernames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
}

/// Quantity of one product owned by an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub product: String,
    pub quantity: i32,
}

/// Consistent snapshot of everything the summary service needs for one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountHistory {
    pub balance: i64,
    pub transfers: Vec<TransferRecord>,
    pub inventory: Vec<InventoryItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_operation_detail() {
        let op = NewOperation::transfer(1, 2, 100);

        assert_eq!(op.kind(), OperationKind::Transfer);
        assert_eq!(op.counterparty_id(), Some(2));
        assert_eq!(op.product_id(), None);
        assert_eq!(op.amount, 100);
    }

    #[test]
    fn test_purchase_operation_detail() {
        let op = NewOperation::purchase(1, 7, 20);

        assert_eq!(op.kind(), OperationKind::Purchase);
        assert_eq!(op.product_id(), Some(7));
        assert_eq!(op.counterparty_id(), None);
        assert_eq!(op.kind().to_string(), "purchase");
    }

    #[test]
    fn test_operation_ids_are_unique() {
        let a = NewOperation::transfer(1, 2, 1);
        let b = NewOperation::transfer(1, 2, 1);
        assert_ne!(a.id, b.id);
    }
}
