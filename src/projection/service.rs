//! Summary Service
//!
//! Read side of the ledger: balance, inventory and transfer history of one
//! account. Reads go through the cache; a miss (or an entry that no longer
//! decodes) falls back to a consistent snapshot from the ledger store.
//! The snapshot is written back only if no invalidation happened since the
//! read began.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{Cache, DEFAULT_TTL};
use crate::domain::{AccountHistory, InventoryItem, LedgerError, OperationContext, TransferRecord};
use crate::store::LedgerStore;

/// Transfer seen from one side: the other party and the amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEntry {
    pub username: String,
    pub amount: i64,
}

/// Everything shown to a user about their own account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub balance: i64,
    pub inventory: Vec<InventoryItem>,
    pub received: Vec<TransferEntry>,
    pub sent: Vec<TransferEntry>,
}

impl UserSummary {
    /// Compose a summary for `username` from its ledger history
    pub fn from_history(username: &str, history: AccountHistory) -> Self {
        let (received, sent) = split_transfers(username, history.transfers);
        Self {
            balance: history.balance,
            inventory: history.inventory,
            received,
            sent,
        }
    }
}

/// Cache key of an account summary
pub fn summary_cache_key(username: &str) -> String {
    format!("user_info:{}", username)
}

/// Drop cached summaries after a committed mutation.
///
/// Also advances each key's generation, so readers whose snapshot predates
/// the mutation do not write it back.
///
/// Failures are logged and swallowed: a stale entry lives at most one TTL.
pub async fn invalidate_summaries(cache: &dyn Cache, usernames: &[&str]) {
    let keys: Vec<String> = usernames.iter().map(|u| summary_cache_key(u)).collect();

    if let Err(e) = cache.delete(&keys).await {
        tracing::error!(keys = ?keys, error = %e, "Failed to invalidate cached summaries");
    }
}

/// Partition transfers into (received, sent) relative to `username`.
///
/// Sent transfers are the ones where the user is the sender; everything else
/// in the history was received.
fn split_transfers(
    username: &str,
    transfers: Vec<TransferRecord>,
) -> (Vec<TransferEntry>, Vec<TransferEntry>) {
    let mut received = Vec::new();
    let mut sent = Vec::new();

    for transfer in transfers {
        if transfer.sender == username {
            sent.push(TransferEntry {
                username: transfer.recipient,
                amount: transfer.amount,
            });
        } else {
            received.push(TransferEntry {
                username: transfer.sender,
                amount: transfer.amount,
            });
        }
    }

    (received, sent)
}

// =========================================================================
// SummaryService
// =========================================================================

/// Read-through cached account summaries
pub struct SummaryService {
    store: Arc<dyn LedgerStore>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl SummaryService {
    pub fn new(store: Arc<dyn LedgerStore>, cache: Arc<dyn Cache>) -> Self {
        Self {
            store,
            cache,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Summary of `username`, served from cache when possible
    pub async fn retrieve(
        &self,
        username: &str,
        context: &OperationContext,
    ) -> Result<UserSummary, LedgerError> {
        if context.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }

        let key = summary_cache_key(username);

        if let Some(summary) = self.cached(&key).await {
            tracing::debug!(username = %username, "Summary served from cache");
            return Ok(summary);
        }

        // Read before the snapshot; an invalidation after this point voids the write-back
        let generation = match self.cache.generation(&key).await {
            Ok(generation) => Some(generation),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache generation unavailable, not caching");
                None
            }
        };

        let history = tokio::select! {
            biased;
            history = self.store.account_history(username) => history?,
            _ = context.cancellation.cancelled() => return Err(LedgerError::Cancelled),
        };

        let history = history.ok_or_else(|| LedgerError::UserNotFound(username.to_string()))?;
        let summary = UserSummary::from_history(username, history);

        if let Some(generation) = generation {
            self.populate(&key, &summary, generation).await;
        }

        Ok(summary)
    }

    /// Cached summary, or `None` on miss, backend failure or undecodable value
    async fn cached(&self, key: &str) -> Option<UserSummary> {
        let raw = match self.cache.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, reading from store");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    async fn populate(&self, key: &str, summary: &UserSummary, generation: u64) {
        let value = match serde_json::to_string(summary) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to encode summary");
                return;
            }
        };

        match self
            .cache
            .set_if_generation(key, value, self.ttl, generation)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(key = %key, "Summary invalidated while reading, not cached");
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to cache summary");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MemoryCache, MockCache};
    use crate::domain::NewOperation;
    use crate::store::{InMemoryLedgerStore, StoreError, UnitOfWork};
    use async_trait::async_trait;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};
    use tokio_util::sync::CancellationToken;

    fn record(sender: &str, recipient: &str, amount: i64) -> TransferRecord {
        TransferRecord {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
        }
    }

    async fn seeded_store() -> InMemoryLedgerStore {
        let store = InMemoryLedgerStore::new();
        let alice = store.seed_account("alice", 500).await.unwrap();
        let bob = store.seed_account("bob", 200).await.unwrap();
        let cup = store.seed_product("cup", 20).await.unwrap();

        let mut uow: Box<dyn UnitOfWork> = store.begin().await.unwrap();
        uow.append_operation(&NewOperation::transfer(alice, bob, 30))
            .await
            .unwrap();
        uow.append_operation(&NewOperation::transfer(bob, alice, 5))
            .await
            .unwrap();
        uow.upsert_inventory(alice, cup).await.unwrap();
        uow.commit().await.unwrap();

        store
    }

    #[test]
    fn test_summary_cache_key() {
        assert_eq!(summary_cache_key("alice"), "user_info:alice");
    }

    #[test]
    fn test_split_transfers() {
        let transfers = vec![
            record("alice", "bob", 100),
            record("carol", "alice", 40),
            record("alice", "carol", 7),
        ];

        let (received, sent) = split_transfers("alice", transfers);

        assert_eq!(
            received,
            vec![TransferEntry {
                username: "carol".to_string(),
                amount: 40
            }]
        );
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].username, "bob");
        assert_eq!(sent[1].username, "carol");
    }

    #[tokio::test]
    async fn test_retrieve_composes_summary() {
        let store = Arc::new(seeded_store().await);
        let service = SummaryService::new(store, Arc::new(MemoryCache::new()));

        let summary = service
            .retrieve("alice", &OperationContext::new())
            .await
            .unwrap();

        assert_eq!(summary.balance, 500);
        assert_eq!(
            summary.inventory,
            vec![InventoryItem {
                product: "cup".to_string(),
                quantity: 1
            }]
        );
        assert_eq!(
            summary.sent,
            vec![TransferEntry {
                username: "bob".to_string(),
                amount: 30
            }]
        );
        assert_eq!(
            summary.received,
            vec![TransferEntry {
                username: "bob".to_string(),
                amount: 5
            }]
        );
    }

    #[tokio::test]
    async fn test_retrieve_unknown_user() {
        let service = SummaryService::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(MemoryCache::new()),
        );

        let err = service
            .retrieve("ghost", &OperationContext::new())
            .await
            .unwrap_err();

        assert_eq!(err, LedgerError::UserNotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_cache_hit_matches_store_read() {
        let store = Arc::new(seeded_store().await);
        let cache = Arc::new(MemoryCache::new());
        let service = SummaryService::new(store, cache.clone());
        let context = OperationContext::new();

        let first = service.retrieve("alice", &context).await.unwrap();
        assert!(cache.get("user_info:alice").await.unwrap().is_some());

        let second = service.retrieve("alice", &context).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store() {
        let cached = UserSummary {
            balance: 42,
            inventory: vec![],
            received: vec![],
            sent: vec![],
        };
        let raw = serde_json::to_string(&cached).unwrap();

        let mut cache = MockCache::new();
        cache
            .expect_get()
            .withf(|key| key == "user_info:alice")
            .returning(move |_| Ok(Some(raw.clone())));
        cache.expect_generation().never();
        cache.expect_set_if_generation().never();

        // Empty store: any store read would report UserNotFound
        let service = SummaryService::new(Arc::new(InMemoryLedgerStore::new()), Arc::new(cache));

        let summary = assert_ok!(service.retrieve("alice", &OperationContext::new()).await);
        assert_eq!(summary, cached);
    }

    #[tokio::test]
    async fn test_undecodable_cache_entry_is_a_miss() {
        let store = Arc::new(seeded_store().await);

        let mut cache = MockCache::new();
        cache
            .expect_get()
            .returning(|_| Ok(Some("{not json".to_string())));
        cache.expect_generation().returning(|_| Ok(0));
        cache
            .expect_set_if_generation()
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let service = SummaryService::new(store, Arc::new(cache));

        let summary = assert_ok!(service.retrieve("alice", &OperationContext::new()).await);
        assert_eq!(summary.balance, 500);
    }

    #[tokio::test]
    async fn test_cache_failures_are_swallowed() {
        let store = Arc::new(seeded_store().await);

        let mut cache = MockCache::new();
        cache
            .expect_get()
            .returning(|_| Err(CacheError::Unavailable("connection refused".to_string())));
        cache.expect_generation().returning(|_| Ok(0));
        cache
            .expect_set_if_generation()
            .times(1)
            .returning(|_, _, _, _| Err(CacheError::Unavailable("connection refused".to_string())));

        let service = SummaryService::new(store, Arc::new(cache));

        let summary = assert_ok!(service.retrieve("bob", &OperationContext::new()).await);
        assert_eq!(summary.balance, 200);
    }

    #[tokio::test]
    async fn test_populate_uses_configured_ttl() {
        let store = Arc::new(seeded_store().await);

        let mut cache = MockCache::new();
        cache.expect_get().returning(|_| Ok(None));
        cache.expect_generation().returning(|_| Ok(3));
        cache
            .expect_set_if_generation()
            .withf(|key, _, ttl, generation| {
                key == "user_info:bob" && *ttl == Duration::from_secs(60) && *generation == 3
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let service =
            SummaryService::new(store, Arc::new(cache)).with_ttl(Duration::from_secs(60));

        assert_ok!(service.retrieve("bob", &OperationContext::new()).await);
    }

    #[tokio::test]
    async fn test_retrieve_cancelled() {
        let store = Arc::new(seeded_store().await);
        let service = SummaryService::new(store, Arc::new(MemoryCache::new()));

        let token = CancellationToken::new();
        token.cancel();
        let context = OperationContext::new().with_cancellation(token);

        let err = assert_err!(service.retrieve("alice", &context).await);
        assert_eq!(err, LedgerError::Cancelled);
    }

    #[tokio::test]
    async fn test_invalidate_summaries_swallows_failures() {
        let mut cache = MockCache::new();
        cache
            .expect_delete()
            .withf(|keys| keys == ["user_info:alice".to_string(), "user_info:bob".to_string()])
            .times(1)
            .returning(|_| Err(CacheError::Unavailable("down".to_string())));

        invalidate_summaries(&cache, &["alice", "bob"]).await;
    }

    #[tokio::test]
    async fn test_generation_failure_skips_write_back() {
        let store = Arc::new(seeded_store().await);

        let mut cache = MockCache::new();
        cache.expect_get().returning(|_| Ok(None));
        cache
            .expect_generation()
            .returning(|_| Err(CacheError::Unavailable("timeout".to_string())));
        cache.expect_set_if_generation().never();

        let service = SummaryService::new(store, Arc::new(cache));

        let summary = assert_ok!(service.retrieve("alice", &OperationContext::new()).await);
        assert_eq!(summary.balance, 500);
    }

    /// Store whose history reads pause after taking their snapshot
    struct PausingHistoryStore {
        inner: InMemoryLedgerStore,
        snapshot_taken: Arc<Notify>,
        resume: Arc<Notify>,
    }

    #[async_trait]
    impl LedgerStore for PausingHistoryStore {
        async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
            self.inner.begin().await
        }

        async fn account_history(&self, username: &str) -> Result<Option<AccountHistory>, StoreError> {
            let history = self.inner.account_history(username).await;
            self.snapshot_taken.notify_one();
            self.resume.notified().await;
            history
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_snapshot_older_than_invalidation_is_not_cached() {
        let inner = InMemoryLedgerStore::new();
        let alice = inner.seed_account("alice", 500).await.unwrap();
        let bob = inner.seed_account("bob", 200).await.unwrap();

        let snapshot_taken = Arc::new(Notify::new());
        let resume = Arc::new(Notify::new());
        let cache = Arc::new(MemoryCache::new());
        let slow_reader = Arc::new(SummaryService::new(
            Arc::new(PausingHistoryStore {
                inner: inner.clone(),
                snapshot_taken: snapshot_taken.clone(),
                resume: resume.clone(),
            }),
            cache.clone(),
        ));

        let reader = slow_reader.clone();
        let read = tokio::spawn(async move {
            reader.retrieve("alice", &OperationContext::new()).await
        });
        snapshot_taken.notified().await;

        // A committed transfer lands between the snapshot and the write-back
        let mut uow = inner.begin().await.unwrap();
        uow.adjust_balance(alice, -100).await.unwrap();
        uow.adjust_balance(bob, 100).await.unwrap();
        uow.append_operation(&NewOperation::transfer(alice, bob, 100))
            .await
            .unwrap();
        uow.commit().await.unwrap();
        invalidate_summaries(cache.as_ref(), &["alice", "bob"]).await;

        resume.notify_one();
        let stale = read.await.unwrap().unwrap();
        assert_eq!(stale.balance, 500);

        assert!(cache.get("user_info:alice").await.unwrap().is_none());

        let fresh = SummaryService::new(Arc::new(inner), cache.clone())
            .retrieve("alice", &OperationContext::new())
            .await
            .unwrap();
        assert_eq!(fresh.balance, 400);
        assert!(cache.get("user_info:alice").await.unwrap().is_some());
    }
}
