use mockall::mock;
use payment_reconciler::{ChargeLookupError, ChargeProvider, ProcessorCharge};

mock! {
    pub Omise {}
    impl ChargeProvider for Omise {
        async fn recent_charges(&self, limit: usize) -> Result<Vec<ProcessorCharge>, ChargeLookupError>;
        async fn fetch_charge(&self, charge_id: &str) -> Result<ProcessorCharge, ChargeLookupError>;
    }
}
