//! Operation Context
//!
//! Contains metadata about the current operation for tracing and cancellation.

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Context for an operation, used for tracing and cancellation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Authenticated username, as supplied by the identity layer
    pub username: Option<String>,

    /// Correlation ID for request tracing
    pub correlation_id: Option<Uuid>,

    /// Fires when the caller gives up on the operation
    pub cancellation: CancellationToken,
}

impl OperationContext {
    /// Create a new context that is never cancelled
    pub fn new() -> Self {
        Self {
            username: None,
            correlation_id: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Create context with the authenticated username
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Create context with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Create context bound to a cancellation token
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}
