//! Projection module
//!
//! Account summaries composed from the ledger and served through a
//! read-through cache. Writers invalidate summaries; they never update them.

mod service;

pub use service::{
    invalidate_summaries, summary_cache_key, SummaryService, TransferEntry, UserSummary,
};
