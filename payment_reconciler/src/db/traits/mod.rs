//! # Database backend contracts
//!
//! * [`OrderManagement`] covers order and payment record lookups, plus order creation.
//! * [`ReconciliationDatabase`] adds the write operations the reconciliation engine needs: confirming an order,
//!   buffering an unmatched confirmation, and linking a buffered confirmation to an order. Each of these is atomic.
mod data_objects;
mod order_management;
mod reconciliation_database;

pub use data_objects::{ConfirmOutcome, InsertOrderResult, LinkOutcome};
pub use order_management::OrderManagement;
pub use reconciliation_database::ReconciliationDatabase;
