//! A thin client for the parts of the Omise REST API that payment reconciliation needs: listing recent charges and
//! fetching a single charge. Everything else (creating charges, sources, customers) lives with the checkout flow.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::OmiseApi;
pub use config::OmiseConfig;
pub use data_objects::{Charge, ChargeList, ChargeSource, ChargeStatus};
pub use error::OmiseApiError;
