use std::sync::Arc;

use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use log::debug;
use payment_reconciler::{
    charges::CHARGE_SUCCESSFUL,
    db_types::{Amount, NewOrder, Order},
    diagnostics::{DiagnosticSink, MemorySink},
    events::EventProducers,
    test_utils::{drop_database, prepare_test_env, random_db_path},
    InsertOrderResult,
    ProcessorCharge,
    ReconciliationApi,
    ReconciliationConfig,
    SqliteDatabase,
    WebhookApi,
};
use serde_json::json;
use storefront_common::Secret;

use super::mocks::MockOmise;
use crate::{
    config::SweepConfig,
    middleware::{ApiKeyMiddlewareFactory, ADMIN_KEY_HEADER},
    routes::{health, LinkPendingRoute, OmiseWebhookRoute, PaymentStatusRoute, PendingConfirmationsRoute, RunSweepRoute},
};

pub const ADMIN_KEY: &str = "test-admin-key-do-not-reuse";

/// A fresh database and diagnostics sink for one test.
pub struct TestContext {
    pub db: SqliteDatabase,
    pub sink: MemorySink,
    pub config: ReconciliationConfig,
}

impl TestContext {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        Self { db, sink: MemorySink::default(), config: ReconciliationConfig::default() }
    }

    pub fn engine(&self) -> ReconciliationApi<SqliteDatabase> {
        ReconciliationApi::new(self.db.clone(), EventProducers::default()).with_config(self.config)
    }

    pub async fn create_order(&self, id: &str, order_number: &str, price: i64) -> Order {
        let order = NewOrder::new(order_number, Amount::from(price)).with_id(id);
        match self.engine().insert_order(order).await.expect("Error inserting order") {
            InsertOrderResult::Inserted(o) => o,
            InsertOrderResult::AlreadyExists(o) => panic!("Order {} already exists", o.order_number),
        }
    }

    /// Registers every route the server exposes, backed by this context's database and the given processor mock.
    pub fn configure(&self, provider: MockOmise) -> impl FnOnce(&mut ServiceConfig) {
        let engine = self.engine();
        let sink: Arc<dyn DiagnosticSink> = Arc::new(self.sink.clone());
        let webhook_api = WebhookApi::new(engine.clone(), provider, sink);
        move |cfg: &mut ServiceConfig| {
            cfg.app_data(web::Data::new(webhook_api))
                .app_data(web::Data::new(engine))
                .app_data(web::Data::new(SweepConfig::default()))
                .service(health)
                .service(PaymentStatusRoute::<SqliteDatabase, MockOmise>::new())
                .service(web::scope("/webhooks").service(OmiseWebhookRoute::<SqliteDatabase, MockOmise>::new()))
                .service(
                    web::scope("/admin")
                        .wrap(ApiKeyMiddlewareFactory::new(Some(Secret::new(ADMIN_KEY.to_string()))))
                        .service(PendingConfirmationsRoute::<SqliteDatabase>::new())
                        .service(LinkPendingRoute::<SqliteDatabase>::new())
                        .service(RunSweepRoute::<SqliteDatabase>::new()),
                );
        }
    }

    pub async fn tear_down(mut self) {
        let url = self.db.url().to_string();
        let _ = self.db.close().await;
        drop_database(&url).await;
    }
}

/// Sends one request through a freshly built app. Errors raised by middleware are turned into their status code and
/// message, so every call yields a `(status, body)` pair.
pub async fn send_request(req: TestRequest, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, String) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let (_, res) = res.into_parts();
            let status = res.status();
            let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
            (status, body)
        },
        Err(e) => (e.as_response_error().status_code(), e.to_string()),
    }
}

pub fn webhook_request(body: String) -> TestRequest {
    TestRequest::post().uri("/webhooks/omise").insert_header(("Content-Type", "application/json")).set_payload(body)
}

pub fn admin_request(req: TestRequest) -> TestRequest {
    req.insert_header((ADMIN_KEY_HEADER, ADMIN_KEY))
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
    hint: Option<&str>,
) -> ProcessorCharge {
    ProcessorCharge {
        id: reference.to_string(),
        status: status.to_string(),
        amount: Amount::from(amount),
        description: None,
        metadata: hint.map(|h| json!({ "order_id": h })),
        source_id: source_id.map(String::from),
        source_type: source_id.map(|_| "promptpay".to_string()),
    }
}

pub fn successful_charge(reference: &str, amount: i64, source_id: &str, hint: Option<&str>) -> ProcessorCharge {
    processor_charge(reference, CHARGE_SUCCESSFUL, amount, Some(source_id), hint)
}
