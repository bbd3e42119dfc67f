use thiserror::Error;

use crate::db_types::OrderId;

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("No order matches '{hint}' for payment {transaction_ref}")]
    NoMatchingOrder { transaction_ref: String, hint: String },
    #[error("There is no pending confirmation for {0}")]
    PendingNotFound(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The pending confirmation for {0} has already been processed")]
    AlreadyProcessed(String),
    #[error("Order {order_id} is already paid by {existing_ref}")]
    OrderPaidByOtherCharge { order_id: OrderId, existing_ref: String },
}

impl ReconciliationError {
    pub fn database<E: std::error::Error>(e: E) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// Errors that can surface from handling a webhook. Only the first three ever reach the caller: processor failures are
/// recorded and then acknowledged as no-ops.
#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),
    #[error("Could not look up the order: {0}")]
    OrderLookupFailure(String),
    #[error("No matching order: {0}")]
    NoMatchingOrder(String),
    #[error("The payment processor timed out: {0}")]
    UpstreamTimeout(String),
    #[error("The payment processor returned an error: {0}")]
    UpstreamFailure(String),
}

impl From<ReconciliationError> for WebhookError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::NoMatchingOrder { .. } => WebhookError::NoMatchingOrder(e.to_string()),
            other => WebhookError::OrderLookupFailure(other.to_string()),
        }
    }
}
