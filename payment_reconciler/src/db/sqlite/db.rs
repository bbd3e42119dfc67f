use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::{db_url, new_pool, orders, payment_info, pending, SqliteDatabaseError};
use crate::{
    db::traits::{ConfirmOutcome, InsertOrderResult, LinkOutcome, OrderManagement, ReconciliationDatabase},
    db_types::{
        ConfirmedPayment,
        NewOrder,
        NewPendingConfirmation,
        Order,
        OrderId,
        PaymentDetails,
        PaymentInfo,
        PendingConfirmation,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn order_by_id(&self, id: &OrderId) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_id(id, &mut conn).await
    }

    async fn order_by_number(&self, order_number: &str) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_number(order_number, &mut conn).await
    }

    async fn order_by_transaction_ref(&self, transaction_ref: &str) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_transaction_ref(transaction_ref, &mut conn).await
    }

    async fn payment_info_for_order(&self, id: &OrderId) -> Result<Option<PaymentInfo>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payment_info::fetch_for_order(id, &mut conn).await
    }

    async fn payment_info_by_ref(&self, transaction_ref: &str) -> Result<Option<PaymentInfo>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payment_info::fetch_by_ref(transaction_ref, &mut conn).await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let method = order.payment_method;
        let result = orders::idempotent_insert(order, &mut tx).await?;
        if let InsertOrderResult::Inserted(o) = &result {
            payment_info::insert_pending(&o.id, method, o.total_price, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(result)
    }
}

impl ReconciliationDatabase for SqliteDatabase {
    async fn confirm_order_payment(
        &self,
        order_id: &OrderId,
        payment: PaymentDetails,
    ) -> Result<ConfirmOutcome, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let outcome = confirm_in_tx(order_id, &payment, &mut tx).await?;
        if let ConfirmOutcome::PaidByOtherCharge { existing_ref, .. } = &outcome {
            tx.rollback().await?;
            debug!(
                "🗃️ Order {order_id} is already paid by {existing_ref}. {} was not applied",
                payment.transaction_ref
            );
            return Ok(outcome);
        }
        if pending::mark_processed(&payment.transaction_ref, &mut tx).await?.is_some() {
            debug!("🗃️ Buffered confirmation {} is now linked to order {order_id}", payment.transaction_ref);
        }
        tx.commit().await?;
        Ok(outcome)
    }

    async fn upsert_pending_confirmation(
        &self,
        pending: NewPendingConfirmation,
    ) -> Result<PendingConfirmation, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        pending::upsert(pending, &mut conn).await
    }

    async fn fetch_pending_confirmation(
        &self,
        transaction_ref: &str,
    ) -> Result<Option<PendingConfirmation>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        pending::fetch_by_ref(transaction_ref, &mut conn).await
    }

    async fn fetch_unprocessed_pending(&self, limit: usize) -> Result<Vec<PendingConfirmation>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        pending::fetch_unprocessed(limit, &mut conn).await
    }

    async fn claim_pending_for_sweep(&self, limit: usize) -> Result<Vec<PendingConfirmation>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        pending::claim_for_sweep(limit, &mut conn).await
    }

    async fn link_pending_confirmation(
        &self,
        transaction_ref: &str,
        order_id: &OrderId,
    ) -> Result<LinkOutcome, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let Some(row) = pending::mark_processed(transaction_ref, &mut tx).await? else {
            let outcome = match pending::fetch_by_ref(transaction_ref, &mut tx).await? {
                Some(_) => LinkOutcome::AlreadyProcessed,
                None => LinkOutcome::PendingNotFound,
            };
            tx.rollback().await?;
            return Ok(outcome);
        };
        let payment = PaymentDetails::new(row.transaction_ref, row.amount, row.method);
        let confirmed = match confirm_in_tx(order_id, &payment, &mut tx).await {
            Ok(ConfirmOutcome::Confirmed(c)) => c,
            Ok(ConfirmOutcome::PaidByOtherCharge { existing_ref, .. }) => {
                tx.rollback().await?;
                return Ok(LinkOutcome::PaidByOtherCharge(existing_ref));
            },
            Err(SqliteDatabaseError::OrderNotFound(_)) => {
                tx.rollback().await?;
                return Ok(LinkOutcome::OrderNotFound);
            },
            Err(e) => return Err(e),
        };
        tx.commit().await?;
        info!("🗃️ Buffered confirmation {transaction_ref} linked to order {order_id}");
        Ok(LinkOutcome::Linked(confirmed))
    }
}

/// Order status first, then the payment record. Both happen inside the caller's transaction. The caller must roll back
/// on `PaidByOtherCharge`.
async fn confirm_in_tx(
    order_id: &OrderId,
    payment: &PaymentDetails,
    conn: &mut sqlx::SqliteConnection,
) -> Result<ConfirmOutcome, SqliteDatabaseError> {
    let newly_confirmed = orders::mark_confirmed(order_id, conn).await?;
    let updated = payment_info::upsert_confirmed(order_id, payment, conn).await?;
    let order = orders::fetch_order_by_id(order_id, conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::OrderNotFound(order_id.clone()))?;
    match updated {
        Some(payment) => Ok(ConfirmOutcome::Confirmed(ConfirmedPayment { order, payment, newly_confirmed })),
        None => {
            let existing_ref = payment_info::fetch_for_order(order_id, conn)
                .await?
                .and_then(|p| p.transaction_ref)
                .unwrap_or_default();
            Ok(ConfirmOutcome::PaidByOtherCharge { order, existing_ref })
        },
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `SPR_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        debug!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), SqliteDatabaseError> {
        self.pool.close().await;
        Ok(())
    }
}
