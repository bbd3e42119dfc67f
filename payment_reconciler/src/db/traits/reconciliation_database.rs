use crate::{
    db::traits::{ConfirmOutcome, LinkOutcome, OrderManagement},
    db_types::{NewPendingConfirmation, OrderId, PaymentDetails, PendingConfirmation},
};

/// Write-side contract for the reconciliation engine. All writes are upserts keyed on a unique column, so replaying the
/// same confirmation any number of times, or concurrently, leaves exactly one row behind.
#[allow(async_fn_in_trait)]
pub trait ReconciliationDatabase: OrderManagement {
    /// In a single transaction:
    /// * marks the order `CONFIRMED`,
    /// * upserts its payment record (status `CONFIRMED`; the transaction reference and confirmation time are only set
    ///   if they are not set already),
    /// * marks any buffered confirmation with the same reference as processed.
    ///
    /// If the payment record already belongs to a different transaction reference, nothing is written and
    /// [`ConfirmOutcome::PaidByOtherCharge`] is returned.
    async fn confirm_order_payment(
        &self,
        order_id: &OrderId,
        payment: PaymentDetails,
    ) -> Result<ConfirmOutcome, Self::Error>;

    /// Inserts the confirmation into the buffer, or refreshes the existing row for the same transaction reference.
    async fn upsert_pending_confirmation(
        &self,
        pending: NewPendingConfirmation,
    ) -> Result<PendingConfirmation, Self::Error>;

    async fn fetch_pending_confirmation(&self, transaction_ref: &str)
        -> Result<Option<PendingConfirmation>, Self::Error>;

    /// Oldest first.
    async fn fetch_unprocessed_pending(&self, limit: usize) -> Result<Vec<PendingConfirmation>, Self::Error>;

    /// Picks up to `limit` unprocessed rows for a sweep, preferring rows that have been swept the fewest times, and
    /// records the attempt. Repeated sweeps therefore cycle through the whole buffer.
    async fn claim_pending_for_sweep(&self, limit: usize) -> Result<Vec<PendingConfirmation>, Self::Error>;

    /// Confirms `order_id` with the payment details of the buffered confirmation and marks it processed, atomically.
    async fn link_pending_confirmation(
        &self,
        transaction_ref: &str,
        order_id: &OrderId,
    ) -> Result<LinkOutcome, Self::Error>;
}
