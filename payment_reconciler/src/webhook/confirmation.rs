use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    charges::ProcessorCharge,
    db_types::{Amount, NewPendingConfirmation, PaymentDetails, PaymentMethod, PaymentStatus},
};

const PENDING_SENTINEL: &str = "pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    ChargeCompleted,
    SourceCompleted,
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::ChargeCompleted => f.write_str(super::CHARGE_COMPLETE),
            EventKind::SourceCompleted => f.write_str(super::SOURCE_COMPLETE),
        }
    }
}

/// What the checkout flow told the processor about the order a charge belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderHint {
    /// An order id or order number.
    Known(String),
    /// The charge was created before the order existed.
    Unresolved,
}

impl OrderHint {
    /// Interprets a raw `metadata.order_id` value. Empty values carry no hint; `"pending"` in any case means
    /// [`OrderHint::Unresolved`].
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let value = raw.map(str::trim).filter(|s| !s.is_empty())?;
        if value.eq_ignore_ascii_case(PENDING_SENTINEL) {
            Some(OrderHint::Unresolved)
        } else {
            Some(OrderHint::Known(value.to_string()))
        }
    }
}

impl Display for OrderHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderHint::Known(v) => write!(f, "{v}"),
            OrderHint::Unresolved => f.write_str("<unresolved>"),
        }
    }
}

/// A successful payment, reported by the processor, that still has to be tied to an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationEvent {
    pub kind: EventKind,
    pub transaction_ref: String,
    pub amount: Amount,
    pub method: PaymentMethod,
    pub description: Option<String>,
    pub hint: Option<OrderHint>,
    pub raw_payload: String,
}

impl ConfirmationEvent {
    pub fn from_charge(kind: EventKind, charge: &ProcessorCharge, raw_payload: &str) -> Self {
        Self {
            kind,
            transaction_ref: charge.id.clone(),
            amount: charge.amount,
            method: charge.payment_method(),
            description: charge.description.clone(),
            hint: OrderHint::parse(charge.metadata_str("order_id")),
            raw_payload: raw_payload.to_string(),
        }
    }

    pub fn payment_details(&self) -> PaymentDetails {
        PaymentDetails::new(self.transaction_ref.clone(), self.amount, self.method)
    }

    pub fn to_pending(&self) -> NewPendingConfirmation {
        NewPendingConfirmation {
            transaction_ref: self.transaction_ref.clone(),
            amount: self.amount,
            method: self.method,
            status: PaymentStatus::Confirmed,
            raw_payload: self.raw_payload.clone(),
        }
    }
}
