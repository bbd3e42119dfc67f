use std::time::Duration;

use log::*;
use storefront_common::Secret;

pub const DEFAULT_OMISE_API_URL: &str = "https://api.omise.co";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CHARGE_SCAN_LIMIT: usize = 20;

#[derive(Debug, Clone)]
pub struct OmiseConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    /// Upper bound on every call made to the processor.
    pub timeout: Duration,
    /// How many of the most recent charges are scanned when looking for the charge behind a source.
    pub charge_scan_limit: usize,
}

impl Default for OmiseConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_OMISE_API_URL.to_string(),
            secret_key: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            charge_scan_limit: DEFAULT_CHARGE_SCAN_LIMIT,
        }
    }
}

impl OmiseConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("SPR_OMISE_API_URL").unwrap_or_else(|_| {
            debug!("🪛️ SPR_OMISE_API_URL not set, using {DEFAULT_OMISE_API_URL}");
            DEFAULT_OMISE_API_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("SPR_OMISE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ SPR_OMISE_SECRET_KEY not set. Calls to the payment processor will be rejected.");
            String::default()
        }));
        let timeout = std::env::var("SPR_OMISE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid value for SPR_OMISE_TIMEOUT_SECS ({s}). {e}")).ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let charge_scan_limit = std::env::var("SPR_OMISE_CHARGE_SCAN_LIMIT")
            .ok()
            .and_then(|s| {
                s.parse::<usize>().map_err(|e| warn!("🪛️ Invalid value for SPR_OMISE_CHARGE_SCAN_LIMIT ({s}). {e}")).ok()
            })
            .unwrap_or(DEFAULT_CHARGE_SCAN_LIMIT);
        Self { api_url, secret_key, timeout, charge_scan_limit }
    }
}
