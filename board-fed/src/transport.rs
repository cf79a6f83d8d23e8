//! Single outbound HTTP client shared by WebFinger, fan-out and outbox import.

use std::net::IpAddr;
use std::time::Duration;

use crate::config::FederationConfig;
use crate::error::{Error, Result};

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Build the process-wide outbound client: optional upstream proxy, fixed user-agent,
/// per-request timeout.
pub fn build_client(config: &FederationConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(USER_AGENT);

    if let Some(proxy_url) = &config.proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| Error::Internal(format!("bad proxy url: {e}")))?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(|e| Error::Internal(e.to_string()))
}

/// Refuse RFC1918 / loopback / link-local targets unless `allow_private_networks` is
/// set, and `.onion` hosts unless a proxy is configured (the only sane way to reach
/// one).
pub fn guard_target(url: &str, config: &FederationConfig) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|_| Error::BadFormat(url.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::BadFormat(url.to_string()))?;

    if host.ends_with(".onion") {
        if config.proxy_url.is_none() {
            return Err(Error::Transport(format!("refusing onion target without proxy: {host}")));
        }
        return Ok(());
    }

    if config.allow_private_networks {
        return Ok(());
    }

    if host == "localhost" {
        return Err(Error::Transport(format!("refusing private-network target: {host}")));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private(ip) {
            return Err(Error::Transport(format!("refusing private-network target: {host}")));
        }
    }

    Ok(())
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(allow_private: bool) -> FederationConfig {
        FederationConfig {
            proxy_url: None,
            allow_private_networks: allow_private,
            no_collapse: false,
            fanout_timeout_secs: 60,
            request_timeout_secs: 10,
        }
    }

    #[test]
    fn refuses_loopback_by_default() {
        let err = guard_target("http://127.0.0.1/inbox", &config(false)).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn allows_loopback_when_opted_in() {
        assert!(guard_target("http://127.0.0.1/inbox", &config(true)).is_ok());
    }

    #[test]
    fn refuses_onion_without_proxy() {
        let err = guard_target("http://example.onion/inbox", &config(false)).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn allows_public_host() {
        assert!(guard_target("https://example.com/inbox", &config(false)).is_ok());
    }
}
