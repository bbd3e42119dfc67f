use log::*;
use omise_tools::{Charge, OmiseApi, OmiseApiError, OmiseConfig};
use payment_reconciler::{ChargeLookupError, ChargeProvider, ProcessorCharge};

use crate::errors::ServerError;

/// Reads charges from the Omise REST API on behalf of the reconciliation engine.
#[derive(Clone)]
pub struct OmiseChargeProvider {
    api: OmiseApi,
}

impl OmiseChargeProvider {
    pub fn new(config: OmiseConfig) -> Result<Self, ServerError> {
        let api = OmiseApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }
}

impl ChargeProvider for OmiseChargeProvider {
    async fn recent_charges(&self, limit: usize) -> Result<Vec<ProcessorCharge>, ChargeLookupError> {
        let charges = self.api.list_recent_charges(limit).await.map_err(|e| lookup_error(e, None))?;
        trace!("📨️ Omise returned {} recent charges", charges.len());
        Ok(charges.into_iter().map(to_processor_charge).collect())
    }

    async fn fetch_charge(&self, charge_id: &str) -> Result<ProcessorCharge, ChargeLookupError> {
        let charge = self.api.get_charge(charge_id).await.map_err(|e| lookup_error(e, Some(charge_id)))?;
        Ok(to_processor_charge(charge))
    }
}

fn to_processor_charge(charge: Charge) -> ProcessorCharge {
    let (source_id, source_type) = match charge.source {
        Some(source) => (Some(source.id), source.source_type),
        None => (None, None),
    };
    ProcessorCharge {
        id: charge.id,
        status: charge.status.as_str().to_string(),
        amount: charge.amount.into(),
        description: charge.description,
        metadata: charge.metadata,
        source_id,
        source_type,
    }
}

fn lookup_error(e: OmiseApiError, charge_id: Option<&str>) -> ChargeLookupError {
    match e {
        OmiseApiError::Timeout(_) => ChargeLookupError::Timeout,
        OmiseApiError::QueryError { status: 404, .. } => {
            ChargeLookupError::NotFound(charge_id.unwrap_or_default().to_string())
        },
        other => ChargeLookupError::Upstream(other.to_string()),
    }
}
