use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use log::{debug, trace, warn};
use once_cell::sync::Lazy;
use regex::Regex;

static FORWARDED_FOR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"for="?(?P<ip>[^;,"]+)"?"#).expect("valid regex"));

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most entry is the original client
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| FORWARDED_FOR.captures(v))
            .and_then(|caps| caps.name("ip"))
            .map(|m| m.as_str())
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr();
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr.map(|a| a.ip())
    })
}

/// Checks a peer against an optional whitelist. No whitelist lets everyone through; a whitelist with an unknown peer
/// lets no one through.
pub fn is_peer_allowed(peer: Option<IpAddr>, whitelist: Option<&[IpAddr]>) -> bool {
    match (peer, whitelist) {
        (_, None) => true,
        (Some(ip), Some(whitelist)) => {
            let allowed = whitelist.contains(&ip);
            if !allowed {
                warn!("📨️ Webhook from {ip} is not on the whitelist. Denying access.");
            }
            allowed
        },
        (None, Some(_)) => {
            warn!("📨️ No IP address found for the remote peer. Denying access.");
            false
        },
    }
}
