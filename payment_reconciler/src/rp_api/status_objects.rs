use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::{ConfirmedPayment, Order, OrderId, PaymentStatus, PendingConfirmation};

/// Where a status answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Order,
    PendingBuffer,
    Processor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationStatus {
    pub status: PaymentStatus,
    pub order: Option<Order>,
    pub source: StatusSource,
}

impl ConfirmationStatus {
    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentStatus::Confirmed
    }
}

/// How a status query identifies the payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusQuery {
    Reference(String),
    OrderId(OrderId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferReason {
    /// The checkout flow created the charge before the order existed.
    UnresolvedHint,
    /// The charge carried no order hint at all.
    NoHint,
    /// The hint names an order that does not exist (yet).
    UnknownHint(String),
    /// The order this payment resolves to is already paid by the charge `existing_ref`.
    OrderPaidByOtherCharge { order_number: String, existing_ref: String },
}

impl Display for BufferReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferReason::UnresolvedHint => f.write_str("order not created yet"),
            BufferReason::NoHint => f.write_str("no order hint"),
            BufferReason::UnknownHint(h) => write!(f, "unknown order '{h}'"),
            BufferReason::OrderPaidByOtherCharge { order_number, existing_ref } => {
                write!(f, "order {order_number} is already paid by {existing_ref}")
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Confirmed(ConfirmedPayment),
    Buffered { pending: PendingConfirmation, reason: BufferReason },
}

/// Tally of one pass over the pending buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResult {
    pub examined: usize,
    pub linked: usize,
    pub still_pending: usize,
    pub failed: usize,
}

impl Display for SweepResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} examined, {} linked, {} still pending, {} failed",
            self.examined, self.linked, self.still_pending, self.failed
        )
    }
}
