use std::fmt::Display;

use payment_reconciler::{
    db_types::{Order, OrderId, PaymentStatus},
    status_objects::{ConfirmationStatus, StatusSource},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Query string for `/api/payment_status`. Exactly one of the two should be given; `reference` wins if both are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentStatusParams {
    pub reference: Option<String>,
    pub order_id: Option<String>,
}

impl PaymentStatusParams {
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(OrderId::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub success: bool,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order: Option<Order>,
    pub source: StatusSource,
}

impl From<ConfirmationStatus> for PaymentStatusResponse {
    fn from(value: ConfirmationStatus) -> Self {
        Self { success: true, status: value.status, order: value.order, source: value.source }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkPendingParams {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PendingListParams {
    pub limit: Option<usize>,
}
