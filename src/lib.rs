//! coin_ledger Library
//!
//! Internal coin ledger: coin transfers between employees, merch purchases
//! and cached account summaries, served over a small HTTP API.
//!
//! Re-exports modules for integration testing and the binaries.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod projection;
pub mod store;

pub use config::Config;
pub use domain::{Coins, CoinsError, LedgerError, OperationContext};
pub use error::{AppError, AppResult};
