use actix_web::{http::StatusCode, test::TestRequest};
use payment_reconciler::{
    db_types::{ConfirmedPayment, PaymentStatus, PendingConfirmation},
    status_objects::SweepResult,
    OrderManagement,
};
use serde_json::json;

use super::{
    helpers::{admin_request, charge_payload, send_request, webhook_request, TestContext},
    mocks::MockOmise,
};
use crate::middleware::ADMIN_KEY_HEADER;

async fn buffer_payment(ctx: &TestContext, reference: &str, amount: i64, description: Option<&str>) {
    let payload = charge_payload(reference, amount, Some("pending"), description);
    let (status, _) = send_request(webhook_request(payload), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);
}

async fn link(ctx: &TestContext, reference: &str, order_id: &str) -> (StatusCode, String) {
    let req = TestRequest::post()
        .uri(&format!("/admin/pending/{reference}/link"))
        .set_json(json!({ "order_id": order_id }));
    send_request(admin_request(req), ctx.configure(MockOmise::new())).await
}

#[actix_web::test]
async fn admin_routes_need_the_key() {
    let ctx = TestContext::new().await;
    let (status, body) = send_request(TestRequest::get().uri("/admin/pending"), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("X-Admin-Key"), "{body}");

    let req = TestRequest::get().uri("/admin/pending").insert_header((ADMIN_KEY_HEADER, "guess"));
    let (status, _) = send_request(req, ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send_request(TestRequest::get().uri("/health"), ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn list_pending_confirmations() {
    let ctx = TestContext::new().await;
    buffer_payment(&ctx, "chrg_1", 150_000, None).await;
    buffer_payment(&ctx, "chrg_2", 900, None).await;
    let req = admin_request(TestRequest::get().uri("/admin/pending"));
    let (status, body) = send_request(req, ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);
    let pending: Vec<PendingConfirmation> = serde_json::from_str(&body).unwrap();
    let refs = pending.iter().map(|p| p.transaction_ref.as_str()).collect::<Vec<_>>();
    assert_eq!(refs, vec!["chrg_1", "chrg_2"]);
    assert!(pending.iter().all(|p| !p.processed));

    let req = admin_request(TestRequest::get().uri("/admin/pending?limit=1"));
    let (_, body) = send_request(req, ctx.configure(MockOmise::new())).await;
    let pending: Vec<PendingConfirmation> = serde_json::from_str(&body).unwrap();
    assert_eq!(pending.len(), 1);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn manual_link() {
    let ctx = TestContext::new().await;
    let order = ctx.create_order("ord_0001", "ORD2024061000123", 150_000).await;
    buffer_payment(&ctx, "chrg_1", 150_000, None).await;

    let (status, body) = link(&ctx, "chrg_1", "ord_0001").await;
    assert_eq!(status, StatusCode::OK);
    let confirmed: ConfirmedPayment = serde_json::from_str(&body).unwrap();
    assert!(confirmed.newly_confirmed);
    assert_eq!(confirmed.order.payment_status, PaymentStatus::Confirmed);
    assert_eq!(confirmed.payment.transaction_ref.as_deref(), Some("chrg_1"));
    let payment = ctx.db.payment_info_for_order(&order.id).await.unwrap().unwrap();
    assert_eq!(payment.transaction_ref.as_deref(), Some("chrg_1"));
    assert!(ctx.engine().unprocessed_pending(10).await.unwrap().is_empty());

    // Linking twice is a conflict
    let (status, _) = link(&ctx, "chrg_1", "ord_0001").await;
    assert_eq!(status, StatusCode::CONFLICT);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn manual_link_to_a_paid_order_is_a_conflict() {
    let ctx = TestContext::new().await;
    let order = ctx.create_order("ord_0001", "ORD2024061000123", 150_000).await;
    buffer_payment(&ctx, "chrg_1", 150_000, None).await;
    buffer_payment(&ctx, "chrg_2", 150_000, None).await;
    let (status, _) = link(&ctx, "chrg_1", "ord_0001").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = link(&ctx, "chrg_2", "ord_0001").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("already paid by chrg_1"), "{body}");
    let payment = ctx.db.payment_info_for_order(&order.id).await.unwrap().unwrap();
    assert_eq!(payment.transaction_ref.as_deref(), Some("chrg_1"));
    let remaining = ctx.engine().unprocessed_pending(10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].transaction_ref, "chrg_2");
    ctx.tear_down().await;
}

#[actix_web::test]
async fn manual_link_with_missing_records() {
    let ctx = TestContext::new().await;
    ctx.create_order("ord_0001", "ORD2024061000123", 150_000).await;
    buffer_payment(&ctx, "chrg_1", 150_000, None).await;

    let (status, _) = link(&ctx, "chrg_404", "ord_0001").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = link(&ctx, "chrg_1", "ord_404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    // A failed link leaves the buffered confirmation in place
    assert_eq!(ctx.engine().unprocessed_pending(10).await.unwrap().len(), 1);
    ctx.tear_down().await;
}

#[actix_web::test]
async fn sweep_on_demand() {
    let ctx = TestContext::new().await;
    buffer_payment(&ctx, "chrg_1", 150_000, Some("Payment for order ORD2024061000999")).await;
    buffer_payment(&ctx, "chrg_2", 900, None).await;
    let order = ctx.create_order("ord_0999", "ORD2024061000999", 150_000).await;

    let req = admin_request(TestRequest::post().uri("/admin/sweep"));
    let (status, body) = send_request(req, ctx.configure(MockOmise::new())).await;
    assert_eq!(status, StatusCode::OK);
    let result: SweepResult = serde_json::from_str(&body).unwrap();
    assert_eq!(result, SweepResult { examined: 2, linked: 1, still_pending: 1, failed: 0 });
    let stored = ctx.db.order_by_id(&order.id).await.unwrap().unwrap();
    assert!(stored.is_confirmed());
    let remaining = ctx.engine().unprocessed_pending(10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].transaction_ref, "chrg_2");
    ctx.tear_down().await;
}
