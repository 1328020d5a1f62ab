//! Purchase Handler
//!
//! Buys one unit of a catalog product: debit, inventory upsert and
//! operation record in one unit of work.

use std::sync::Arc;

use crate::cache::Cache;
use crate::domain::{LedgerError, NewOperation, OperationContext};
use crate::projection::invalidate_summaries;
use crate::store::LedgerStore;

use super::unit_of_work::{reject, run_cancellable, Staged};
use super::{PurchaseCommand, PurchaseResult};

// =========================================================================
// PurchaseHandler
// =========================================================================

/// Handler for merch purchases
pub struct PurchaseHandler {
    store: Arc<dyn LedgerStore>,
    cache: Arc<dyn Cache>,
}

impl PurchaseHandler {
    pub fn new(store: Arc<dyn LedgerStore>, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    /// Execute the purchase command
    pub async fn execute(
        &self,
        command: PurchaseCommand,
        context: &OperationContext,
    ) -> Result<PurchaseResult, LedgerError> {
        let result = self.purchase(&command, context).await;

        match &result {
            Ok(purchase) => {
                tracing::info!(
                    operation_id = %purchase.operation_id,
                    correlation_id = ?context.correlation_id,
                    username = %purchase.username,
                    product = %purchase.product,
                    price = purchase.price,
                    "Purchase committed"
                );
                invalidate_summaries(self.cache.as_ref(), &[purchase.username.as_str()]).await;
            }
            Err(e) if e.is_business_error() => {
                tracing::warn!(
                    correlation_id = ?context.correlation_id,
                    username = %command.username,
                    product = %command.product,
                    error = %e,
                    "Purchase rejected"
                );
            }
            Err(LedgerError::Cancelled) => {
                tracing::warn!(
                    correlation_id = ?context.correlation_id,
                    username = %command.username,
                    "Purchase cancelled"
                );
            }
            Err(e) => {
                tracing::error!(
                    correlation_id = ?context.correlation_id,
                    username = %command.username,
                    product = %command.product,
                    error = %e,
                    "Purchase failed"
                );
            }
        }

        result
    }

    async fn purchase(
        &self,
        command: &PurchaseCommand,
        context: &OperationContext,
    ) -> Result<PurchaseResult, LedgerError> {
        let staged = run_cancellable(context, self.stage(command)).await?;
        staged.commit().await
    }

    /// Lock the buyer, validate and write the purchase, stopping short of commit
    async fn stage(&self, command: &PurchaseCommand) -> Result<Staged<PurchaseResult>, LedgerError> {
        let mut uow = self.store.begin().await?;

        let Some(buyer) = uow.lock_account(&command.username).await? else {
            return reject(uow, LedgerError::UserNotFound(command.username.clone())).await;
        };

        let Some(product) = uow.read_product(&command.product).await? else {
            return reject(uow, LedgerError::ProductNotFound(command.product.clone())).await;
        };

        if buyer.balance < product.price {
            return reject(
                uow,
                LedgerError::insufficient_funds(product.price, buyer.balance),
            )
            .await;
        }

        uow.adjust_balance(buyer.id, -product.price).await?;
        let quantity = uow.upsert_inventory(buyer.id, product.id).await?;

        let operation = NewOperation::purchase(buyer.id, product.id, product.price);
        uow.append_operation(&operation).await?;

        let result = PurchaseResult {
            operation_id: operation.id,
            username: buyer.username,
            product: product.name,
            price: product.price,
            balance: buyer.balance - product.price,
            quantity,
        };

        Ok(Staged::new(uow, result))
    }
}
