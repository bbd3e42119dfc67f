use actix_web::http::StatusCode;
use payment_reconciler::{
    db_types::{Amount, PaymentMethod, PaymentStatus},
    diagnostics::DiagnosticOutcome,
    ChargeLookupError,
    OrderManagement,
    ReconciliationConfig,
};

use super::{
    helpers::{charge_payload, send_request, source_payload, successful_charge, webhook_request, TestContext},
    mocks::MockOmise,
};
use crate::data_objects::JsonResponse;

const ORDER_NUMBER: &str = "ORD2024061000123";

#[actix_web::test]
async fn charge_with_order_number_confirms_order() {
    let ctx = TestContext::new().await;
    let order = ctx.create_order("ord_0001", ORDER_NUMBER, 150_000).await;
    let body = charge_payload("chrg_1", 150_000, Some(ORDER_NUMBER), None);
    let (status, body) = send_request(webhook_request(body), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);
    let res: JsonResponse = serde_json::from_str(&body).unwrap();
    assert!(res.success);
    assert_eq!(res.message, format!("Payment chrg_1 confirmed order {ORDER_NUMBER}"));

    let stored = ctx.db.order_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Confirmed);
    let payment = ctx.db.payment_info_by_ref("chrg_1").await.unwrap().expect("payment info should exist");
    assert_eq!(payment.order_id, order.id);
    assert_eq!(payment.amount, Amount::from(150_000));
    assert_eq!(payment.method, PaymentMethod::CreditCard);
    assert_eq!(ctx.sink.outcomes(), vec![DiagnosticOutcome::Confirmed]);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn early_payment_is_buffered_once() {
    let ctx = TestContext::new().await;
    let payload = charge_payload("chrg_1", 150_000, Some("pending"), None);
    for _ in 0..2 {
        let (status, body) = send_request(webhook_request(payload.clone()), ctx.configure(MockOmise::new())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("recorded for later matching"), "{body}");
    }
    let pending = ctx.engine().unprocessed_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].transaction_ref, "chrg_1");
    assert_eq!(pending[0].amount.to_string(), "1500.00");
    assert_eq!(ctx.sink.outcomes(), vec![
        DiagnosticOutcome::BufferedUnresolvedHint,
        DiagnosticOutcome::BufferedUnresolvedHint
    ]);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn replayed_confirmation_is_harmless() {
    let ctx = TestContext::new().await;
    ctx.create_order("ord_0001", ORDER_NUMBER, 150_000).await;
    let payload = charge_payload("chrg_1", 150_000, Some(ORDER_NUMBER), None);
    for _ in 0..3 {
        let (status, _) = send_request(webhook_request(payload.clone()), ctx.configure(MockOmise::new())).await;
        assert_eq!(status, StatusCode::OK);
    }
    let payment = ctx.db.payment_info_by_ref("chrg_1").await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Confirmed);
    assert!(ctx.engine().unprocessed_pending(10).await.unwrap().is_empty());
    ctx.tear_down().await;
}

#[actix_web::test]
async fn malformed_payload_is_rejected() {
    let ctx = TestContext::new().await;
    let (status, body) = send_request(webhook_request("{not json".into()), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("\"error\""), "{body}");
    assert_eq!(ctx.sink.outcomes(), vec![DiagnosticOutcome::MalformedPayload]);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn unknown_order_is_rejected_when_not_buffering() {
    let mut ctx = TestContext::new().await;
    ctx.config = ReconciliationConfig { buffer_unknown_hints: false };
    let payload = charge_payload("chrg_9", 500, Some("ORD0000000000"), None);
    let (status, _) = send_request(webhook_request(payload), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(ctx.engine().unprocessed_pending(10).await.unwrap().is_empty());
    assert_eq!(ctx.sink.outcomes(), vec![DiagnosticOutcome::NoMatchingOrder]);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn unknown_order_is_buffered_by_default() {
    let ctx = TestContext::new().await;
    let payload = charge_payload("chrg_9", 500, Some("ORD0000000000"), None);
    let (status, _) = send_request(webhook_request(payload), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx.engine().unprocessed_pending(10).await.unwrap().len(), 1);
    assert_eq!(ctx.sink.outcomes(), vec![DiagnosticOutcome::BufferedUnknownHint]);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn completed_source_confirms_order_through_its_charge() {
    let ctx = TestContext::new().await;
    let order = ctx.create_order("ord_0002", ORDER_NUMBER, 4_200).await;
    let mut omise = MockOmise::new();
    omise.expect_recent_charges().times(1).returning(|_| {
        Ok(vec![
            successful_charge("chrg_other", 100, "src_other", None),
            successful_charge("chrg_qr", 4_200, "src_qr", Some(ORDER_NUMBER)),
        ])
    });
    let (status, body) = send_request(webhook_request(source_payload("src_qr")), ctx.configure(omise)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Payment chrg_qr confirmed order"), "{body}");
    let payment = ctx.db.payment_info_for_order(&order.id).await.unwrap().unwrap();
    assert_eq!(payment.transaction_ref.as_deref(), Some("chrg_qr"));
    assert_eq!(payment.method, PaymentMethod::PromptPay);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn processor_failure_is_acknowledged() {
    let ctx = TestContext::new().await;
    let mut omise = MockOmise::new();
    omise.expect_recent_charges().times(1).returning(|_| Err(ChargeLookupError::Timeout));
    let (status, body) = send_request(webhook_request(source_payload("src_qr")), ctx.configure(omise)).await;
    assert_eq!(status, StatusCode::OK);
    let res: JsonResponse = serde_json::from_str(&body).unwrap();
    assert!(res.success);
    assert!(res.message.starts_with("Event ignored"), "{}", res.message);
    assert_eq!(ctx.sink.outcomes(), vec![DiagnosticOutcome::UpstreamUnavailable]);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn other_events_are_ignored() {
    let ctx = TestContext::new().await;
    let payload = serde_json::json!({ "key": "customer.create", "data": { "id": "cust_1" } }).to_string();
    let (status, body) = send_request(webhook_request(payload), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("customer.create"), "{body}");
    assert_eq!(ctx.sink.outcomes(), vec![DiagnosticOutcome::Ignored]);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn database_outage_asks_for_a_retry() {
    let ctx = TestContext::new().await;
    ctx.db.pool().close().await;
    let payload = charge_payload("chrg_10", 150_000, Some(ORDER_NUMBER), None);
    let (status, body) = send_request(webhook_request(payload), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Could not look up the order"), "{body}");
    assert_eq!(ctx.sink.outcomes(), vec![DiagnosticOutcome::LookupFailure]);
    assert_eq!(ctx.sink.records()[0].transaction_ref.as_deref(), Some("chrg_10"));
    ctx.tear_down().await;
}

#[actix_web::test]
async fn second_charge_for_a_paid_order_is_recorded() {
    let ctx = TestContext::new().await;
    let order = ctx.create_order("ord_0003", ORDER_NUMBER, 150_000).await;
    let first = charge_payload("chrg_1", 150_000, Some(ORDER_NUMBER), None);
    let (status, _) = send_request(webhook_request(first), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);
    let second = charge_payload("chrg_2", 90_000, Some(ORDER_NUMBER), None);
    let (status, body) = send_request(webhook_request(second), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("already paid by chrg_1"), "{body}");

    let payment = ctx.db.payment_info_for_order(&order.id).await.unwrap().unwrap();
    assert_eq!(payment.transaction_ref.as_deref(), Some("chrg_1"));
    assert_eq!(payment.amount, Amount::from(150_000));
    let pending = ctx.engine().unprocessed_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].transaction_ref, "chrg_2");
    assert_eq!(ctx.sink.outcomes(), vec![DiagnosticOutcome::Confirmed, DiagnosticOutcome::BufferedExtraCharge]);
    ctx.tear_down().await;
}
