//! Unit of work helpers shared by the command handlers

use std::future::Future;

use crate::domain::{LedgerError, OperationContext};
use crate::store::UnitOfWork;

/// Order in which two accounts are locked.
///
/// Every unit of work that locks more than one account takes the locks in
/// ascending username order, so two transfers crossing the same pair of
/// accounts in opposite directions cannot deadlock.
pub fn lock_order<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Roll back after a business-rule failure and return that failure.
///
/// A failed rollback is logged only: the transaction is discarded when the
/// connection drops it, and the caller still learns the business outcome.
pub async fn reject<T>(uow: Box<dyn UnitOfWork>, err: LedgerError) -> Result<T, LedgerError> {
    if let Err(e) = uow.rollback().await {
        tracing::error!(error = %e, "Rollback after rejected operation failed");
    }
    Err(err)
}

/// Unit of work whose writes are complete and only await commit
pub struct Staged<T> {
    uow: Box<dyn UnitOfWork>,
    outcome: T,
}

impl<T> Staged<T> {
    pub fn new(uow: Box<dyn UnitOfWork>, outcome: T) -> Self {
        Self { uow, outcome }
    }

    /// Commit and hand back the staged outcome.
    ///
    /// Not cancellable: once commit starts, the caller gets its real result.
    pub async fn commit(self) -> Result<T, LedgerError> {
        self.uow.commit().await?;
        Ok(self.outcome)
    }
}

/// Run `work` unless the context is cancelled first.
///
/// An already-cancelled context never polls `work`. If cancellation fires
/// while `work` is in flight, `work` is dropped together with any unit of
/// work it holds, which discards its writes. `work` must stop short of
/// commit; see [`Staged`].
pub async fn run_cancellable<T, F>(context: &OperationContext, work: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    if context.is_cancelled() {
        return Err(LedgerError::Cancelled);
    }

    tokio::select! {
        biased;
        result = work => result,
        _ = context.cancellation.cancelled() => Err(LedgerError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryLedgerStore, LedgerStore};
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_lock_order_is_symmetric() {
        assert_eq!(lock_order("alice", "bob"), ("alice", "bob"));
        assert_eq!(lock_order("bob", "alice"), ("alice", "bob"));
        assert_eq!(lock_order("alice", "alice"), ("alice", "alice"));
    }

    #[tokio::test]
    async fn test_run_cancellable_skips_work_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let context = OperationContext::new().with_cancellation(token);

        let mut polled = false;
        let result: Result<(), LedgerError> = run_cancellable(&context, async {
            polled = true;
            Ok(())
        })
        .await;

        assert_eq!(result, Err(LedgerError::Cancelled));
        assert!(!polled);
    }

    #[tokio::test]
    async fn test_staged_commit_publishes_writes() {
        let store = InMemoryLedgerStore::new();
        let alice = store.seed_account("alice", 10).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.adjust_balance(alice, 5).await.unwrap();
        let staged = Staged::new(uow, "done");

        assert_eq!(staged.commit().await, Ok("done"));
        assert_eq!(store.balance("alice").await, Some(15));
    }

    #[tokio::test]
    async fn test_run_cancellable_returns_work_result() {
        let context = OperationContext::new();

        let result = run_cancellable(&context, async { Ok::<_, LedgerError>(7) }).await;

        assert_eq!(result, Ok(7));
    }
}
