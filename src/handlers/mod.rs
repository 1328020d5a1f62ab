//! Command Handlers module
//!
//! The transaction engine. Each handler runs one business operation as a
//! single unit of work against the ledger store and invalidates the cached
//! summaries it affects once the unit of work has committed.

mod commands;
mod purchase_handler;
mod transfer_handler;
mod unit_of_work;


pub use commands::*;
pub use purchase_handler::PurchaseHandler;
pub use transfer_handler::TransferHandler;
pub use unit_of_work::lock_order;
