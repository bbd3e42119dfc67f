use serde::{Deserialize, Serialize};

use crate::db_types::{Order, PaymentInfo, PendingConfirmation};

/// Emitted when an order moves from `PENDING` to `CONFIRMED`. Replays of a confirmation do not emit it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmedEvent {
    pub order: Order,
    pub payment: PaymentInfo,
}

impl OrderConfirmedEvent {
    pub fn new(order: Order, payment: PaymentInfo) -> Self {
        Self { order, payment }
    }
}

/// Emitted whenever a confirmation is written to the pending buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationBufferedEvent {
    pub pending: PendingConfirmation,
    pub reason: String,
}

impl ConfirmationBufferedEvent {
    pub fn new<S: Into<String>>(pending: PendingConfirmation, reason: S) -> Self {
        Self { pending, reason: reason.into() }
    }
}
