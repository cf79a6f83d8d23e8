//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `BOARD_`)
//! 2. `./config.toml` in the working directory
//! 3. Built-in defaults

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration for the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub federation: FederationConfig,
    pub captcha: CaptchaConfig,
    pub trip: TripConfig,
}

/// Service-level configuration: where the server listens and how it names itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Fully-qualified domain name this server is reachable at. Used to derive board actor URLs.
    pub fqdn: String,

    /// Scheme used when deriving actor/apid URLs: `http` or `https`.
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Private-mode servers short-circuit ban checks to "not banned" and never persist IPs.
    #[serde(default)]
    pub private: bool,
}

/// Storage engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file. `:memory:` is accepted for tests.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

/// Federation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Optional upstream proxy URL for all outbound HTTP (WebFinger, fan-out, outbox import).
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Allow outbound connections to RFC1918 / loopback / link-local targets.
    #[serde(default)]
    pub allow_private_networks: bool,

    /// Peer quirk: serialize some empty collections as `[]` instead of omitting them.
    #[serde(default)]
    pub no_collapse: bool,

    /// Per-activity fan-out deadline, in seconds.
    #[serde(default = "default_fanout_timeout")]
    pub fanout_timeout_secs: u64,

    /// Per-request outbound HTTP timeout, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// CAPTCHA pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaConfig {
    /// Refill the pool synchronously once it drops below this many spare entries.
    #[serde(default = "default_captcha_low_water")]
    pub pool_low_water: usize,

    /// How many entries to generate on refill.
    #[serde(default = "default_captcha_batch")]
    pub refill_batch: usize,
}

/// Tripcode configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripConfig {
    /// Global secret appended before hashing `##`-form secure tripcodes.
    #[serde(default = "default_trip_secret")]
    pub secret: String,
}

fn default_transport() -> String {
    "https".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_storage_path() -> String {
    "board.sqlite3".to_string()
}
fn default_fanout_timeout() -> u64 {
    60
}
fn default_request_timeout() -> u64 {
    10
}
fn default_captcha_low_water() -> usize {
    10
}
fn default_captcha_batch() -> usize {
    50
}
fn default_trip_secret() -> String {
    "change-me".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            fqdn: "localhost".to_string(),
            transport: default_transport(),
            port: default_port(),
            log_level: default_log_level(),
            timeout_secs: default_timeout(),
            private: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            allow_private_networks: false,
            no_collapse: false,
            fanout_timeout_secs: default_fanout_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            pool_low_water: default_captcha_low_water(),
            refill_batch: default_captcha_batch(),
        }
    }
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            secret: default_trip_secret(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            storage: StorageConfig::default(),
            federation: FederationConfig::default(),
            captcha: CaptchaConfig::default(),
            trip: TripConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, `./config.toml`, then `BOARD_*` env vars.
    pub fn load() -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("BOARD_").split("_"))
            .extract()?;
        Ok(config)
    }

    /// The board actor URL: `{transport}://{fqdn}/{board}`.
    pub fn board_actor_url(&self, board: &str) -> String {
        format!("{}://{}/{}", self.service.transport, self.service.fqdn, board)
    }
}
