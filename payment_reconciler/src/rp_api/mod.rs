//! # Reconciliation engine public API
//!
//! * [`reconciliation_api`] applies confirmations to orders, buffers the ones it cannot match, sweeps and links
//!   buffered confirmations, and answers payment status queries from the database.
//! * [`webhook_api`] drives a raw processor webhook through classification, the processor lookup for source events,
//!   and reconciliation, writing one diagnostic record per webhook.
//!
//! Both are created by supplying a database backend that implements [`crate::ReconciliationDatabase`]:
//!
//! ```rust,ignore
//! use payment_reconciler::{events::EventProducers, ReconciliationApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/storefront.db", 25).await?;
//! let api = ReconciliationApi::new(db, EventProducers::default());
//! let status = api.status_by_reference("chrg_test_5xuy4w91xqz7d1w9u0t").await?;
//! ```
pub mod errors;
pub mod reconciliation_api;
pub mod status_objects;
pub mod webhook_api;
