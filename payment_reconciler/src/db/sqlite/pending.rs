use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewPendingConfirmation, PendingConfirmation},
};

const PENDING_COLUMNS: &str =
    "id, transaction_ref, amount, method, status, raw_payload, processed, created_at, updated_at";

/// Inserts the confirmation, or refreshes the row for the same transaction reference in place. The `processed` flag is
/// left alone on conflict. A refreshed row goes back to the front of the sweep queue.
pub async fn upsert(
    pending: NewPendingConfirmation,
    conn: &mut SqliteConnection,
) -> Result<PendingConfirmation, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, PendingConfirmation>(&format!(
        r#"
            INSERT INTO pending_confirmations (transaction_ref, amount, method, status, raw_payload)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (transaction_ref) DO UPDATE SET
                amount = excluded.amount,
                method = excluded.method,
                status = excluded.status,
                raw_payload = excluded.raw_payload,
                sweep_attempts = 0,
                updated_at = CURRENT_TIMESTAMP
            RETURNING {PENDING_COLUMNS};
        "#
    ))
    .bind(&pending.transaction_ref)
    .bind(pending.amount)
    .bind(pending.method)
    .bind(pending.status)
    .bind(&pending.raw_payload)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Pending confirmation {} stored as row #{}", row.transaction_ref, row.id);
    Ok(row)
}

pub async fn fetch_by_ref(
    transaction_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PendingConfirmation>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, PendingConfirmation>(&format!(
        "SELECT {PENDING_COLUMNS} FROM pending_confirmations WHERE transaction_ref = $1"
    ))
    .bind(transaction_ref)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_unprocessed(
    limit: usize,
    conn: &mut SqliteConnection,
) -> Result<Vec<PendingConfirmation>, SqliteDatabaseError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = sqlx::query_as::<_, PendingConfirmation>(&format!(
        "SELECT {PENDING_COLUMNS} FROM pending_confirmations WHERE processed = FALSE ORDER BY created_at, id LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Claims up to `limit` unprocessed rows for a sweep, least-swept first, and bumps their attempt counters. Rows that
/// never match drift to the back of the queue, so a fixed batch size cannot starve newer rows.
pub async fn claim_for_sweep(
    limit: usize,
    conn: &mut SqliteConnection,
) -> Result<Vec<PendingConfirmation>, SqliteDatabaseError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut rows = sqlx::query_as::<_, PendingConfirmation>(&format!(
        r#"
            UPDATE pending_confirmations SET sweep_attempts = sweep_attempts + 1
            WHERE id IN (
                SELECT id FROM pending_confirmations WHERE processed = FALSE ORDER BY sweep_attempts, id LIMIT $1
            )
            RETURNING {PENDING_COLUMNS};
        "#
    ))
    .bind(limit)
    .fetch_all(conn)
    .await?;
    // RETURNING makes no ordering promise
    rows.sort_by_key(|r| r.id);
    trace!("🗃️ Claimed {} pending confirmations for a sweep", rows.len());
    Ok(rows)
}

/// Marks the unprocessed row for `transaction_ref` as processed and returns it. Returns `None` if there is no such row,
/// or it was already processed.
pub async fn mark_processed(
    transaction_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PendingConfirmation>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, PendingConfirmation>(&format!(
        r#"
            UPDATE pending_confirmations SET processed = TRUE, updated_at = CURRENT_TIMESTAMP
            WHERE transaction_ref = $1 AND processed = FALSE
            RETURNING {PENDING_COLUMNS};
        "#
    ))
    .bind(transaction_ref)
    .fetch_optional(conn)
    .await?;
    if row.is_some() {
        trace!("🗃️ Pending confirmation {transaction_ref} marked as processed");
    }
    Ok(row)
}
