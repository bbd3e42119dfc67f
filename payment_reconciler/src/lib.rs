//! Payment Reconciler
//!
//! The reconciler confirms, out of band, that a customer's payment succeeded and ties that confirmation to a locally
//! created order. Confirmations arrive as processor webhooks, possibly duplicated, delayed, out of order, or before the
//! order they belong to has been written.
//!
//! The library is divided into these sections:
//! 1. Database management ([`mod@db`]). Only SQLite is supported. The [`OrderManagement`] and
//!    [`ReconciliationDatabase`] traits are the contract a backend must fulfil. The data types are public in
//!    [`db_types`].
//! 2. Webhook classification ([`webhook`]). Turns raw processor payloads into [`webhook::ConfirmationEvent`]s.
//! 3. Order resolution ([`resolver`]). An ordered list of lookup strategies.
//! 4. The public API ([`rp_api`]): [`ReconciliationApi`] applies or buffers confirmations, and [`WebhookApi`] drives a
//!    raw webhook body through the whole pipeline.
//!
//! Every webhook outcome is written as a [`diagnostics::DiagnosticRecord`] to an injected sink, and confirmations are
//! published as [`events`] so that other parts of the system can react to them.
mod db;

pub mod charges;
pub mod db_types;
pub mod diagnostics;
pub mod events;
pub mod helpers;
pub mod resolver;
pub mod rp_api;
pub mod webhook;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use charges::{ChargeLookupError, ChargeProvider, ProcessorCharge};
#[cfg(feature = "sqlite")]
pub use db::sqlite::{db_url, SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{ConfirmOutcome, InsertOrderResult, LinkOutcome, OrderManagement, ReconciliationDatabase};
pub use rp_api::{
    errors::{ReconciliationError, WebhookError},
    reconciliation_api::{ReconciliationApi, ReconciliationConfig},
    status_objects,
    webhook_api::WebhookApi,
};
