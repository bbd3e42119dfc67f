use actix_web::{http::StatusCode, test::TestRequest};
use payment_reconciler::{
    charges::CHARGE_SUCCESSFUL,
    db_types::PaymentStatus,
    status_objects::StatusSource,
    ChargeLookupError,
};

use super::{
    helpers::{charge_payload, processor_charge, send_request, webhook_request, TestContext},
    mocks::MockOmise,
};
use crate::data_objects::PaymentStatusResponse;

fn status_request(query: &str) -> TestRequest {
    TestRequest::get().uri(&format!("/api/payment_status?{query}"))
}

fn parse(body: &str) -> PaymentStatusResponse {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Unexpected response {body}. {e}"))
}

#[actix_web::test]
async fn status_by_order_id() {
    let ctx = TestContext::new().await;
    let order = ctx.create_order("ord_0001", "ORD2024061000123", 150_000).await;
    let (status, body) = send_request(status_request("order_id=ord_0001"), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);
    let res = parse(&body);
    assert!(res.success);
    assert_eq!(res.status, PaymentStatus::Pending);
    assert_eq!(res.order.map(|o| o.id), Some(order.id));
    assert_eq!(res.source, StatusSource::Order);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn unknown_order_id_is_not_found() {
    let ctx = TestContext::new().await;
    let (status, body) = send_request(status_request("order_id=ord_nope"), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("ord_nope"), "{body}");
    ctx.tear_down().await;
}

#[actix_web::test]
async fn missing_parameters_are_rejected() {
    let ctx = TestContext::new().await;
    let (status, _) = send_request(status_request("reference="), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn status_by_reference_after_confirmation() {
    let ctx = TestContext::new().await;
    ctx.create_order("ord_0001", "ORD2024061000123", 150_000).await;
    let payload = charge_payload("chrg_1", 150_000, Some("ORD2024061000123"), None);
    let (status, _) = send_request(webhook_request(payload), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);

    // The processor is never consulted when the database knows the reference
    let (status, body) = send_request(status_request("reference=chrg_1"), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);
    let res = parse(&body);
    assert_eq!(res.status, PaymentStatus::Confirmed);
    assert_eq!(res.order.map(|o| o.order_number), Some("ORD2024061000123".to_string()));
    ctx.tear_down().await;
}

#[actix_web::test]
async fn status_of_buffered_payment() {
    let ctx = TestContext::new().await;
    let payload = charge_payload("chrg_1", 150_000, Some("pending"), None);
    send_request(webhook_request(payload), ctx.configure(MockOmise::new())).await;
    let (status, body) = send_request(status_request("reference=chrg_1"), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);
    let res = parse(&body);
    assert!(res.order.is_none());
    assert_eq!(res.source, StatusSource::PendingBuffer);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn status_falls_back_to_processor() {
    let ctx = TestContext::new().await;
    let mut omise = MockOmise::new();
    omise
        .expect_fetch_charge()
        .withf(|id: &str| id == "chrg_remote")
        .times(1)
        .returning(|id| Ok(processor_charge(id, CHARGE_SUCCESSFUL, 100, None, None)));
    let (status, body) = send_request(status_request("reference=chrg_remote"), ctx.configure(omise)).await;
    assert_eq!(status, StatusCode::OK);
    let res = parse(&body);
    assert_eq!(res.status, PaymentStatus::Confirmed);
    assert_eq!(res.source, StatusSource::Processor);

    let mut omise = MockOmise::new();
    omise.expect_fetch_charge().times(1).returning(|id| Ok(processor_charge(id, "pending", 100, None, None)));
    let (_, body) = send_request(status_request("reference=chrg_remote"), ctx.configure(omise)).await;
    assert_eq!(parse(&body).status, PaymentStatus::Pending);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn processor_errors_read_as_pending() {
    let ctx = TestContext::new().await;
    let mut omise = MockOmise::new();
    omise.expect_fetch_charge().times(1).returning(|id| Err(ChargeLookupError::NotFound(id.to_string())));
    let (status, body) = send_request(status_request("reference=chrg_ghost"), ctx.configure(omise)).await;
    assert_eq!(status, StatusCode::OK);
    let res = parse(&body);
    assert_eq!(res.status, PaymentStatus::Pending);
    assert_eq!(res.source, StatusSource::Processor);
    ctx.tear_down().await;
}
