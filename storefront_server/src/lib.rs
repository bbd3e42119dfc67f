//! # Storefront payment server
//! This crate hosts the HTTP face of the payment reconciler. It is responsible for:
//! * Receiving payment webhooks from Omise and handing them to the reconciliation engine.
//! * Answering payment status queries from the checkout page.
//! * A small, key-protected back office for buffered confirmations.
//! * Sweeping buffered confirmations in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhooks/omise`: Omise webhook events. Optionally restricted to an IP whitelist.
//! * `/api/payment_status`: Payment status by processor reference or by order id.
//! * `/admin/pending`, `/admin/pending/{reference}/link`, `/admin/sweep`: back office routes. These require the
//!   `X-Admin-Key` header.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod hooks;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sweep_worker;

#[cfg(test)]
mod endpoint_tests;
