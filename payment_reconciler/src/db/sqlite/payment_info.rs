use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{Amount, OrderId, PaymentDetails, PaymentInfo, PaymentMethod},
};

const PAYMENT_COLUMNS: &str =
    "id, order_id, method, transaction_ref, amount, status, confirmed_at, created_at, updated_at";

/// Creates the empty `PENDING` payment record for a freshly inserted order. Does nothing if one already exists.
pub async fn insert_pending(
    order_id: &OrderId,
    method: PaymentMethod,
    amount: Amount,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query("INSERT INTO payment_info (order_id, method, amount) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
        .bind(order_id)
        .bind(method)
        .bind(amount)
        .execute(conn)
        .await?;
    Ok(())
}

/// Upserts the payment record for `order_id` as `CONFIRMED`. Returns `None`, without touching the row, if the record
/// already belongs to a different transaction reference. A zero amount never replaces a recorded one.
pub async fn upsert_confirmed(
    order_id: &OrderId,
    payment: &PaymentDetails,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentInfo>, SqliteDatabaseError> {
    let info = sqlx::query_as::<_, PaymentInfo>(&format!(
        r#"
            INSERT INTO payment_info (order_id, method, transaction_ref, amount, status, confirmed_at)
            VALUES ($1, $2, $3, $4, 'CONFIRMED', CURRENT_TIMESTAMP)
            ON CONFLICT (order_id) DO UPDATE SET
                method = excluded.method,
                amount = CASE WHEN excluded.amount = 0 THEN payment_info.amount ELSE excluded.amount END,
                status = 'CONFIRMED',
                transaction_ref = COALESCE(payment_info.transaction_ref, excluded.transaction_ref),
                confirmed_at = COALESCE(payment_info.confirmed_at, excluded.confirmed_at),
                updated_at = CURRENT_TIMESTAMP
            WHERE payment_info.transaction_ref IS NULL OR payment_info.transaction_ref = excluded.transaction_ref
            RETURNING {PAYMENT_COLUMNS};
        "#
    ))
    .bind(order_id)
    .bind(payment.method)
    .bind(&payment.transaction_ref)
    .bind(payment.amount)
    .fetch_optional(conn)
    .await?;
    match &info {
        Some(i) => trace!("🗃️ Payment record for order {order_id} is confirmed with reference {:?}", i.transaction_ref),
        None => trace!("🗃️ Payment record for order {order_id} belongs to another charge. Left as is"),
    }
    Ok(info)
}

pub async fn fetch_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentInfo>, SqliteDatabaseError> {
    let info = sqlx::query_as::<_, PaymentInfo>(&format!("SELECT {PAYMENT_COLUMNS} FROM payment_info WHERE order_id = $1"))
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(info)
}

pub async fn fetch_by_ref(
    transaction_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentInfo>, SqliteDatabaseError> {
    let info = sqlx::query_as::<_, PaymentInfo>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payment_info WHERE transaction_ref = $1"
    ))
    .bind(transaction_ref)
    .fetch_optional(conn)
    .await?;
    Ok(info)
}
