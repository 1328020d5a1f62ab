//! Domain module
//!
//! Core domain types shared by the engine, the stores and the API.

pub mod coins;
pub mod context;
pub mod error;
pub mod model;

pub use coins::{Coins, CoinsError};
pub use context::OperationContext;
pub use error::LedgerError;
pub use model::{
    AccountHistory, AccountRow, Credentials, InventoryItem, NewOperation, OperationDetail,
    OperationKind, ProductRow, TransferRecord,
};
