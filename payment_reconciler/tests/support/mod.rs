#![allow(dead_code)]
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use payment_reconciler::{
    charges::CHARGE_SUCCESSFUL,
    db_types::{Amount, NewOrder, Order},
    test_utils::{prepare_test_env, random_db_path},
    webhook::{classify, ClassifiedEvent, ConfirmationEvent, EventKind},
    ChargeLookupError,
    ChargeProvider,
    InsertOrderResult,
    OrderManagement,
    ProcessorCharge,
    SqliteDatabase,
};
use serde_json::json;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub async fn setup() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub async fn tear_down(mut db: SqliteDatabase) {
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    let _ = Sqlite::drop_database(db.url()).await;
}

pub async fn create_order(db: &SqliteDatabase, id: &str, order_number: &str, price: i64) -> Order {
    let order = NewOrder::new(order_number, Amount::from(price)).with_id(id);
    match db.insert_order(order).await.expect("Error inserting order") {
        InsertOrderResult::Inserted(o) => o,
        InsertOrderResult::AlreadyExists(o) => panic!("Order {} already exists", o.order_number),
    }
}

/// A `charge.complete` webhook body for a successful charge.
pub fn charge_payload(reference: &str, amount: i64, order_hint: Option<&str>, description: Option<&str>) -> String {
    let mut data = json!({
        "object": "charge",
        "id": reference,
        "status": "successful",
        "amount": amount,
        "currency": "thb",
        "paid": true,
    });
    if let Some(hint) = order_hint {
        data["metadata"] = json!({ "order_id": hint });
    }
    if let Some(description) = description {
        data["description"] = json!(description);
    }
    json!({ "object": "event", "key": "charge.complete", "data": data }).to_string()
}

pub fn charge_event(reference: &str, amount: i64, order_hint: Option<&str>, description: Option<&str>) -> ConfirmationEvent {
    let payload = charge_payload(reference, amount, order_hint, description);
    let Ok(ClassifiedEvent::ChargeCompleted(charge)) = classify(payload.as_bytes()) else {
        panic!("Test payload did not classify as a charge");
    };
    ConfirmationEvent::from_charge(EventKind::ChargeCompleted, &charge, &payload)
}

pub fn source_payload(source_id: &str) -> String {
    json!({
        "object": "event",
        "key": "source.complete",
        "data": { "object": "source", "id": source_id, "type": "promptpay", "flow": "offline" }
    })
    .to_string()
}

pub fn processor_charge(
    reference: &str,
    status: &str,
    amount: i64,
    source_id: Option<&str>,
    order_hint: Option<&str>,
) -> ProcessorCharge {
    ProcessorCharge {
        id: reference.to_string(),
        status: status.to_string(),
        amount: Amount::from(amount),
        description: None,
        metadata: order_hint.map(|h| json!({ "order_id": h })),
        source_id: source_id.map(String::from),
        source_type: source_id.map(|_| "promptpay".to_string()),
    }
}

pub fn successful_charge(reference: &str, amount: i64, source_id: &str, order_hint: Option<&str>) -> ProcessorCharge {
    processor_charge(reference, CHARGE_SUCCESSFUL, amount, Some(source_id), order_hint)
}

/// A payment processor that answers from a fixed list of charges.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    charges: Vec<ProcessorCharge>,
    failure: Option<ChargeLookupError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn with_charges(charges: Vec<ProcessorCharge>) -> Self {
        Self { charges, ..Default::default() }
    }

    pub fn failing(error: ChargeLookupError) -> Self {
        Self { failure: Some(error), ..Default::default() }
    }

    pub fn slow(delay: Duration, charges: Vec<ProcessorCharge>) -> Self {
        Self { charges, delay: Some(delay), ..Default::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> Result<(), ChargeLookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl ChargeProvider for ScriptedProvider {
    async fn recent_charges(&self, limit: usize) -> Result<Vec<ProcessorCharge>, ChargeLookupError> {
        self.answer().await?;
        Ok(self.charges.iter().take(limit).cloned().collect())
    }

    async fn fetch_charge(&self, charge_id: &str) -> Result<ProcessorCharge, ChargeLookupError> {
        self.answer().await?;
        self.charges
            .iter()
            .find(|c| c.id == charge_id)
            .cloned()
            .ok_or_else(|| ChargeLookupError::NotFound(charge_id.to_string()))
    }
}
