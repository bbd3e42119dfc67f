use std::{env, net::IpAddr, time::Duration};

use log::*;
use omise_tools::OmiseConfig;
use payment_reconciler::rp_api::webhook_api::WebhookConfig;
use storefront_common::{parse_boolean_flag, Secret};

const DEFAULT_SPR_HOST: &str = "127.0.0.1";
const DEFAULT_SPR_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.db";
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_SWEEP_BATCH_SIZE: usize = 50;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The value callers must supply in the `X-Admin-Key` header. If `None`, every `/admin` call is refused.
    pub admin_api_key: Option<Secret<String>>,
    pub omise: OmiseConfig,
    /// If supplied, requests against `/webhooks` endpoints are checked against this whitelist.
    /// To explicitly disable the whitelist, set `SPR_WEBHOOK_IP_WHITELIST` to "false", "none", or "0".
    pub webhook_whitelist: Option<Vec<IpAddr>>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// Buffer confirmations whose order hint names an order that does not exist, rather than rejecting them.
    pub buffer_unknown_hints: bool,
    pub sweep: SweepConfig,
    /// When set, webhook diagnostics are appended to this file as JSON lines.
    pub diagnostics_log: Option<String>,
}

/// Settings for the buffered-confirmation sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepConfig {
    /// Time between sweeps. Zero disables the background worker; `/admin/sweep` still works.
    pub interval: Duration,
    pub batch_size: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval: DEFAULT_SWEEP_INTERVAL, batch_size: DEFAULT_SWEEP_BATCH_SIZE }
    }
}

impl SweepConfig {
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPR_HOST.to_string(),
            port: DEFAULT_SPR_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            admin_api_key: None,
            omise: OmiseConfig::default(),
            webhook_whitelist: None,
            use_x_forwarded_for: false,
            use_forwarded: false,
            buffer_unknown_hints: true,
            sweep: SweepConfig::default(),
            diagnostics_log: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPR_HOST").ok().unwrap_or_else(|| DEFAULT_SPR_HOST.into());
        let port = env::var("SPR_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPR_PORT. {e} Using the default, {DEFAULT_SPR_PORT}, instead."
                    );
                    DEFAULT_SPR_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPR_PORT);
        let database_url = env::var("SPR_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SPR_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.into()
        });
        let admin_api_key = env::var("SPR_ADMIN_API_KEY").ok().filter(|s| !s.trim().is_empty()).map(Secret::new);
        if admin_api_key.is_none() {
            warn!("🪛️ SPR_ADMIN_API_KEY is not set. All calls to /admin will be refused.");
        }
        let omise = OmiseConfig::new_from_env_or_default();
        let webhook_whitelist = configure_whitelist(env::var("SPR_WEBHOOK_IP_WHITELIST").ok());
        let use_x_forwarded_for = parse_boolean_flag(env::var("SPR_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("SPR_USE_FORWARDED").ok(), false);
        let buffer_unknown_hints = parse_boolean_flag(env::var("SPR_BUFFER_UNKNOWN_HINTS").ok(), true);
        if !buffer_unknown_hints {
            info!("🪛️ Payments that name an unknown order will be rejected with 404 instead of being buffered.");
        }
        let sweep = configure_sweep();
        let diagnostics_log = env::var("SPR_DIAGNOSTICS_LOG").ok().filter(|s| !s.trim().is_empty());
        Self {
            host,
            port,
            database_url,
            admin_api_key,
            omise,
            webhook_whitelist,
            use_x_forwarded_for,
            use_forwarded,
            buffer_unknown_hints,
            sweep,
            diagnostics_log,
        }
    }

    pub fn webhook_config(&self) -> WebhookConfig {
        WebhookConfig { lookup_timeout: self.omise.timeout, charge_scan_limit: self.omise.charge_scan_limit }
    }
}

/// Parses a comma-separated IP whitelist. `none`, `false` and `0` disable the whitelist.
pub fn configure_whitelist(value: Option<String>) -> Option<Vec<IpAddr>> {
    let whitelist = value.and_then(|s| {
        if ["none", "false", "0"].contains(&s.trim().to_lowercase().as_str()) {
            info!(
                "🪛️ Webhook IP whitelist is disabled. If this is not what you want, set SPR_WEBHOOK_IP_WHITELIST to a \
                 comma-separated list of IP addresses to enable it."
            );
            return None;
        }
        let ip_addrs = s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| {
                s.parse::<IpAddr>()
                    .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in SPR_WEBHOOK_IP_WHITELIST: {e}"))
                    .ok()
            })
            .collect::<Vec<IpAddr>>();
        Some(ip_addrs)
    });
    match &whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The webhook IP whitelist was configured, but is empty. The server will run, but won't accept any \
                 incoming webhooks."
            );
        },
        None => {
            info!("🪛️ No webhook IP whitelist is set. Webhooks are accepted from any address.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ Webhook IP whitelist: {addrs}");
        },
    }
    whitelist
}

fn configure_sweep() -> SweepConfig {
    let interval = env::var("SPR_SWEEP_INTERVAL_SECS")
        .map_err(|_| {
            info!(
                "🪛️ SPR_SWEEP_INTERVAL_SECS is not set. Using the default value of {}s.",
                DEFAULT_SWEEP_INTERVAL.as_secs()
            )
        })
        .and_then(|s| {
            s.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| warn!("🪛️ Invalid configuration value for SPR_SWEEP_INTERVAL_SECS. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_SWEEP_INTERVAL);
    let batch_size = env::var("SPR_SWEEP_BATCH_SIZE")
        .ok()
        .and_then(|s| {
            s.trim()
                .parse::<usize>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for SPR_SWEEP_BATCH_SIZE. {e}"))
                .ok()
        })
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_SWEEP_BATCH_SIZE);
    SweepConfig { interval, batch_size }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn whitelist_parsing() {
        assert_eq!(configure_whitelist(None), None);
        assert_eq!(configure_whitelist(Some("None".into())), None);
        assert_eq!(configure_whitelist(Some("0".into())), None);
        let list = configure_whitelist(Some("10.0.0.1, not-an-ip,::1".into())).unwrap();
        assert_eq!(list, vec!["10.0.0.1".parse::<IpAddr>().unwrap(), "::1".parse::<IpAddr>().unwrap()]);
        assert_eq!(configure_whitelist(Some("garbage".into())), Some(vec![]));
    }

    #[test]
    fn sweep_can_be_disabled() {
        let config = SweepConfig { interval: Duration::ZERO, batch_size: 10 };
        assert!(!config.is_enabled());
        assert!(SweepConfig::default().is_enabled());
    }

    #[test]
    fn webhook_config_follows_omise_settings() {
        let mut config = ServerConfig::new("0.0.0.0", 9000);
        config.omise.timeout = Duration::from_secs(3);
        config.omise.charge_scan_limit = 5;
        let webhook = config.webhook_config();
        assert_eq!(webhook.lookup_timeout, Duration::from_secs(3));
        assert_eq!(webhook.charge_scan_limit, 5);
        assert_eq!(config.port, 9000);
        assert!(config.buffer_unknown_hints);
    }
}
