//! Transfer Handler
//!
//! Moves coins between two accounts in one unit of work.

use std::sync::Arc;

use crate::cache::Cache;
use crate::domain::{Coins, LedgerError, NewOperation, OperationContext};
use crate::projection::invalidate_summaries;
use crate::store::LedgerStore;

use super::unit_of_work::{lock_order, reject, run_cancellable, Staged};
use super::{TransferCommand, TransferResult};

// =========================================================================
// TransferHandler
// =========================================================================

/// Handler for coin transfers
pub struct TransferHandler {
    store: Arc<dyn LedgerStore>,
    cache: Arc<dyn Cache>,
}

impl TransferHandler {
    pub fn new(store: Arc<dyn LedgerStore>, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    /// Execute the transfer command
    pub async fn execute(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> Result<TransferResult, LedgerError> {
        let result = self.transfer(&command, context).await;

        match &result {
            Ok(transfer) => {
                tracing::info!(
                    operation_id = %transfer.operation_id,
                    correlation_id = ?context.correlation_id,
                    sender = %transfer.sender,
                    recipient = %transfer.recipient,
                    amount = transfer.amount,
                    "Transfer committed"
                );
                invalidate_summaries(
                    self.cache.as_ref(),
                    &[transfer.sender.as_str(), transfer.recipient.as_str()],
                )
                .await;
            }
            Err(e) if e.is_business_error() => {
                tracing::warn!(
                    correlation_id = ?context.correlation_id,
                    sender = %command.sender,
                    recipient = %command.recipient,
                    amount = command.amount,
                    error = %e,
                    "Transfer rejected"
                );
            }
            Err(LedgerError::Cancelled) => {
                tracing::warn!(
                    correlation_id = ?context.correlation_id,
                    sender = %command.sender,
                    "Transfer cancelled"
                );
            }
            Err(e) => {
                tracing::error!(
                    correlation_id = ?context.correlation_id,
                    sender = %command.sender,
                    recipient = %command.recipient,
                    error = %e,
                    "Transfer failed"
                );
            }
        }

        result
    }

    async fn transfer(
        &self,
        command: &TransferCommand,
        context: &OperationContext,
    ) -> Result<TransferResult, LedgerError> {
        if command.sender == command.recipient {
            return Err(LedgerError::SelfTransfer);
        }

        let amount = Coins::new(command.amount)?;

        let staged = run_cancellable(context, self.stage(command, amount)).await?;
        staged.commit().await
    }

    /// Lock, validate and write the transfer, stopping short of commit
    async fn stage(
        &self,
        command: &TransferCommand,
        amount: Coins,
    ) -> Result<Staged<TransferResult>, LedgerError> {
        let mut uow = self.store.begin().await?;

        let (first, second) = lock_order(&command.sender, &command.recipient);
        let first_row = uow.lock_account(first).await?;
        let second_row = uow.lock_account(second).await?;

        let (sender, recipient) = if first == command.sender {
            (first_row, second_row)
        } else {
            (second_row, first_row)
        };

        let Some(sender) = sender else {
            return reject(uow, LedgerError::UserNotFound(command.sender.clone())).await;
        };

        if !amount.is_covered_by(sender.balance) {
            return reject(
                uow,
                LedgerError::insufficient_funds(amount.value(), sender.balance),
            )
            .await;
        }

        let Some(recipient) = recipient else {
            return reject(uow, LedgerError::UserNotFound(command.recipient.clone())).await;
        };

        uow.adjust_balance(sender.id, amount.as_debit()).await?;
        uow.adjust_balance(recipient.id, amount.value()).await?;

        let operation = NewOperation::transfer(sender.id, recipient.id, amount.value());
        uow.append_operation(&operation).await?;

        let result = TransferResult {
            operation_id: operation.id,
            sender: sender.username,
            recipient: recipient.username,
            amount: amount.value(),
            sender_balance: sender.balance - amount.value(),
        };

        Ok(Staged::new(uow, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_command() {
        let cmd = TransferCommand::new("alice", "bob", 100);

        assert_eq!(cmd.sender, "alice");
        assert_eq!(cmd.recipient, "bob");
        assert_eq!(cmd.amount, 100);
    }
}
