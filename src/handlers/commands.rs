//! Command definitions
//!
//! Commands represent intentions to change the ledger.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =========================================================================
// TransferCommand
// =========================================================================

/// Command to move coins from one account to another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    /// Username of the sender (the authenticated caller)
    pub sender: String,
    /// Username of the recipient
    pub recipient: String,
    /// Coins to move, must be positive
    pub amount: i64,
}

impl TransferCommand {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: i64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }
}

// =========================================================================
// PurchaseCommand
// =========================================================================

/// Command to buy one unit of a catalog product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseCommand {
    /// Username of the buyer
    pub username: String,
    /// Catalog product name
    pub product: String,
}

impl PurchaseCommand {
    pub fn new(username: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            product: product.into(),
        }
    }
}

/// Result of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub operation_id: Uuid,
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
    /// Sender's balance after the transfer
    pub sender_balance: i64,
}

/// Result of a committed purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseResult {
    pub operation_id: Uuid,
    pub username: String,
    pub product: String,
    pub price: i64,
    /// Buyer's balance after the purchase
    pub balance: i64,
    /// Units of the product owned after the purchase
    pub quantity: i32,
}
