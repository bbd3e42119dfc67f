//! The seam between the reconciler and the payment processor. The engine only ever needs to read charges, and the
//! server supplies an implementation backed by the processor's REST API.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::db_types::{Amount, PaymentMethod};

pub const CHARGE_SUCCESSFUL: &str = "successful";

#[derive(Debug, Clone, Error)]
pub enum ChargeLookupError {
    #[error("The payment processor did not answer in time")]
    Timeout,
    #[error("Charge {0} does not exist")]
    NotFound(String),
    #[error("Payment processor error: {0}")]
    Upstream(String),
}

/// A charge as reported by the payment processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorCharge {
    pub id: String,
    pub status: String,
    pub amount: Amount,
    pub description: Option<String>,
    pub metadata: Option<Value>,
    pub source_id: Option<String>,
    pub source_type: Option<String>,
}

impl ProcessorCharge {
    pub fn is_successful(&self) -> bool {
        self.status == CHARGE_SUCCESSFUL
    }

    pub fn payment_method(&self) -> PaymentMethod {
        PaymentMethod::from_source_type(self.source_type.as_deref())
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    /// True if the charge was created from `source_id`, according to its embedded source object only.
    pub fn has_embedded_source(&self, source_id: &str) -> bool {
        self.source_id.as_deref() == Some(source_id)
    }

    /// True if the checkout flow recorded `source_id` in the charge metadata.
    pub fn has_metadata_source(&self, source_id: &str) -> bool {
        self.metadata_str("source_id") == Some(source_id)
    }
}

/// Picks the charge created from `source_id`: an embedded source match first, then a `metadata.source_id` match.
pub fn select_charge_for_source<'a>(charges: &'a [ProcessorCharge], source_id: &str) -> Option<&'a ProcessorCharge> {
    charges
        .iter()
        .find(|c| c.has_embedded_source(source_id))
        .or_else(|| charges.iter().find(|c| c.has_metadata_source(source_id)))
}

/// Read access to the payment processor's charges.
#[allow(async_fn_in_trait)]
pub trait ChargeProvider {
    /// The `limit` most recent charges, newest first.
    async fn recent_charges(&self, limit: usize) -> Result<Vec<ProcessorCharge>, ChargeLookupError>;

    async fn fetch_charge(&self, charge_id: &str) -> Result<ProcessorCharge, ChargeLookupError>;
}
