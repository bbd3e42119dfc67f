//! Adapters between the reconciliation engine and third-party services.
mod omise;

pub use omise::OmiseChargeProvider;
