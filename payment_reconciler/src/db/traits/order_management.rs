use crate::{
    db::traits::InsertOrderResult,
    db_types::{NewOrder, Order, OrderId, PaymentInfo},
};

/// The `OrderManagement` trait defines the behaviour for querying orders and their payment records in the database
/// backend.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn order_by_id(&self, id: &OrderId) -> Result<Option<Order>, Self::Error>;

    async fn order_by_number(&self, order_number: &str) -> Result<Option<Order>, Self::Error>;

    /// The order whose payment record carries the given processor transaction reference.
    async fn order_by_transaction_ref(&self, transaction_ref: &str) -> Result<Option<Order>, Self::Error>;

    async fn payment_info_for_order(&self, id: &OrderId) -> Result<Option<PaymentInfo>, Self::Error>;

    async fn payment_info_by_ref(&self, transaction_ref: &str) -> Result<Option<PaymentInfo>, Self::Error>;

    /// Inserts the order and its empty `PENDING` payment record. If an order with the same order number exists, it is
    /// returned unchanged.
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error>;
}
