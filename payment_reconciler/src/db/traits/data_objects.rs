use crate::db_types::{ConfirmedPayment, Order};

#[derive(Debug, Clone)]
pub enum InsertOrderResult {
    Inserted(Order),
    AlreadyExists(Order),
}

/// Outcome of confirming an order against a payment.
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    Confirmed(ConfirmedPayment),
    /// The order's payment record already carries `existing_ref`. Nothing was written.
    PaidByOtherCharge { order: Order, existing_ref: String },
}

/// Outcome of linking a buffered confirmation to an order. Only `Linked` changes anything in the database.
#[derive(Debug, Clone)]
pub enum LinkOutcome {
    Linked(ConfirmedPayment),
    PendingNotFound,
    OrderNotFound,
    AlreadyProcessed,
    /// The order was paid by the charge `existing_ref`. The buffered row stays unprocessed.
    PaidByOtherCharge(String),
}
