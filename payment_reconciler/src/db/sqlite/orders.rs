use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::InsertOrderResult},
    db_types::{NewOrder, Order, OrderId},
};

const ORDER_COLUMNS: &str = "id, order_number, payment_status, total_price, created_at, updated_at";

/// Inserts the order if no order with the same order number exists. The empty payment record is created by the caller,
/// inside the same transaction.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, SqliteDatabaseError> {
    // The write comes first so that the transaction holds the write lock before anything is read.
    let inserted = sqlx::query_as::<_, Order>(&format!(
        r#"
            INSERT INTO orders (id, order_number, total_price) VALUES ($1, $2, $3)
            ON CONFLICT (order_number) DO NOTHING
            RETURNING {ORDER_COLUMNS};
        "#
    ))
    .bind(&order.id)
    .bind(&order.order_number)
    .bind(order.total_price)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(o) => {
            debug!("🗃️ Order {} saved with id {}", o.order_number, o.id);
            Ok(InsertOrderResult::Inserted(o))
        },
        None => {
            let existing = fetch_order_by_number(&order.order_number, conn).await?.ok_or_else(|| {
                SqliteDatabaseError::QueryError(format!("Order {} conflicted but could not be read", order.order_number))
            })?;
            trace!("🗃️ Order {} already exists", existing.order_number);
            Ok(InsertOrderResult::AlreadyExists(existing))
        },
    }
}

pub async fn fetch_order_by_id(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_number(
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"))
        .bind(order_number)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_transaction_ref(
    transaction_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(
        r#"
            SELECT o.id, o.order_number, o.payment_status, o.total_price, o.created_at, o.updated_at
            FROM orders o JOIN payment_info p ON p.order_id = o.id
            WHERE p.transaction_ref = $1
        "#,
    )
    .bind(transaction_ref)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Sets the order's payment status to `CONFIRMED`. Returns `true` if the order was pending before this call and `false`
/// if it was already confirmed. Fails with `OrderNotFound` if there is no such order.
pub async fn mark_confirmed(id: &OrderId, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET payment_status = 'CONFIRMED', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND payment_status <> 'CONFIRMED'
        "#,
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() > 0 {
        trace!("🗃️ Order {id} marked as confirmed");
        return Ok(true);
    }
    match fetch_order_by_id(id, conn).await? {
        Some(_) => Ok(false),
        None => Err(SqliteDatabaseError::OrderNotFound(id.clone())),
    }
}
