//! Gateway configuration.
//!
//! Everything is read from environment variables once at startup. Missing
//! panel settings do not stop the gateway from starting; they surface as
//! configuration errors on the first request that needs them.

use std::time::Duration;

use panelgate_issuer::PanelConfig;
use panelgate_relay::RelayConfig;

/// Top-level configuration for a Panelgate process.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address of the HTTP front door (default `127.0.0.1:8080`).
    pub http_addr: String,
    /// Address of the console relay listener (default `127.0.0.1:8081`).
    pub relay_addr: String,
    /// Where the panel is and which keys to use.
    pub panel: PanelConfig,
    /// Per-session relay tunables.
    pub relay: RelayConfig,
    /// Mounts `GET /debug/credentials` when set.
    pub diagnostics_enabled: bool,
}

impl GatewayConfig {
    pub const DEFAULT_HTTP_ADDR: &'static str = "127.0.0.1:8080";
    pub const DEFAULT_RELAY_ADDR: &'static str = "127.0.0.1:8081";

    /// Build the configuration from environment variables.
    ///
    /// | Variable                        | Default          |
    /// |---------------------------------|------------------|
    /// | `PANELGATE_HTTP_ADDR`           | `127.0.0.1:8080` |
    /// | `PANELGATE_RELAY_ADDR`          | `127.0.0.1:8081` |
    /// | `PANEL_URL`                     | unset            |
    /// | `PANEL_CLIENT_KEY`              | unset            |
    /// | `PANEL_APPLICATION_KEY`         | unset            |
    /// | `PANELGATE_CREDENTIAL_TTL_SECS` | `900` (`0` = no expiry) |
    /// | `PANELGATE_AUTH_TIMEOUT_SECS`   | `15`             |
    /// | `PANELGATE_QUEUE_CAPACITY`      | `200`            |
    /// | `PANELGATE_DIAGNOSTICS`         | `false`          |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading values through
    /// `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str| get(key).and_then(|v| v.parse::<u64>().ok());

        let credential_ttl = match number("PANELGATE_CREDENTIAL_TTL_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(RelayConfig::DEFAULT_CREDENTIAL_TTL),
        };

        let relay = RelayConfig {
            auth_timeout: number("PANELGATE_AUTH_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(RelayConfig::DEFAULT_AUTH_TIMEOUT),
            queue_capacity: number("PANELGATE_QUEUE_CAPACITY")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(RelayConfig::DEFAULT_QUEUE_CAPACITY),
            credential_ttl,
        };

        Self {
            http_addr: get("PANELGATE_HTTP_ADDR")
                .unwrap_or_else(|| Self::DEFAULT_HTTP_ADDR.to_owned()),
            relay_addr: get("PANELGATE_RELAY_ADDR")
                .unwrap_or_else(|| Self::DEFAULT_RELAY_ADDR.to_owned()),
            panel: PanelConfig {
                base_url: get("PANEL_URL")
                    .map(|url| url.trim_end_matches('/').to_owned()),
                client_key: get("PANEL_CLIENT_KEY"),
                application_key: get("PANEL_APPLICATION_KEY"),
            },
            relay,
            diagnostics_enabled: get("PANELGATE_DIAGNOSTICS")
                .is_some_and(|v| is_enabled(&v)),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn is_enabled(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
