//! Environment-driven configuration (spec §6). There's no config file —
//! every setting is a discrete named environment variable, same as the
//! source this server's config surface was distilled from, so values are
//! read directly rather than through a generic config-merging layer.

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::{DEFAULT_POOL_SIZE, DEFAULT_STORE_PORT, DEFAULT_TTL};

const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";
const FALLBACK_UPSTREAM: &str = "8.8.8.8";
const DEFAULT_DNS_PORT: u16 = 53;
const DEFAULT_STORE_CONNECT_TIMEOUT_MS: u64 = 500;
const DEFAULT_STORE_READ_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ConfigFile {
    /// Listening interface, `BIND` env var
    pub address: String,
    /// Listening port
    pub port: u16,
    /// Override-store host, `REDIS` env var
    pub redis_host: String,
    /// Override-store port
    pub redis_port: u16,
    /// Override-store database index, `REDIS_DB` env var
    pub redis_db: u64,
    /// Number of store connections held open by the pool
    pub pool_size: usize,
    /// Upstream resolver host, `DNS_RELAY` env var (port is always 53)
    pub dns_relay: String,
    /// TTL applied to locally-answered A records
    pub answer_ttl: u32,
    /// Timeout for opening a connection to the override store
    pub store_connect_timeout_ms: u64,
    /// Timeout for a single override-store request/reply round trip
    pub store_read_timeout_ms: u64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: DEFAULT_DNS_PORT,
            redis_host: "127.0.0.1".to_string(),
            redis_port: DEFAULT_STORE_PORT,
            redis_db: 0,
            pool_size: DEFAULT_POOL_SIZE,
            dns_relay: get_default_resolver(DEFAULT_RESOLV_CONF),
            answer_ttl: DEFAULT_TTL,
            store_connect_timeout_ms: DEFAULT_STORE_CONNECT_TIMEOUT_MS,
            store_read_timeout_ms: DEFAULT_STORE_READ_TIMEOUT_MS,
        }
    }
}

impl Display for ConfigFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "listening_address=\"{}:{}\" redis=\"{}:{}\" redis_db={} pool_size={} dns_relay=\"{}\" answer_ttl={} store_connect_timeout_ms={} store_read_timeout_ms={}",
            self.address,
            self.port,
            self.redis_host,
            self.redis_port,
            self.redis_db,
            self.pool_size,
            self.dns_relay,
            self.answer_ttl,
            self.store_connect_timeout_ms,
            self.store_read_timeout_ms
        )
    }
}

impl ConfigFile {
    /// Loads config from the environment, per spec §6's table. A `NO_UVLOOP`
    /// variable is recognised but has no effect — the event loop
    /// implementation is a non-goal (spec §9).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("BIND") {
            config.address = value;
        }
        if let Ok(value) = std::env::var("REDIS") {
            config.redis_host = value;
        }
        if let Ok(value) = std::env::var("REDIS_DB") {
            if let Ok(db) = value.parse() {
                config.redis_db = db;
            } else {
                tracing::warn!("REDIS_DB={value:?} is not a valid integer, ignoring");
            }
        }
        if let Ok(value) = std::env::var("DNS_RELAY") {
            config.dns_relay = value;
        }
        if std::env::var("NO_UVLOOP").is_ok() {
            tracing::debug!("NO_UVLOOP is set; this server has no alternate event loop to disable");
        }

        config
    }

    /// JSON-pretty-printed configuration, for the `print-config` subcommand.
    pub fn as_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("ConfigFile always serializes")
    }

    /// Bindable address for the DNS listener.
    pub fn listener_address(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.address, self.port)
            .parse()
            .map_err(|e| ServerError::Startup(format!("invalid listener address: {e}")))
    }

    /// Resolved upstream address, defaulting to port 53 when `dns_relay`
    /// is a bare host.
    pub fn dns_relay_address(&self) -> Result<SocketAddr, ServerError> {
        parse_host_with_default_port(&self.dns_relay, DEFAULT_DNS_PORT)
            .map_err(|e| ServerError::Startup(format!("invalid dns_relay address: {e}")))
    }
}

fn parse_host_with_default_port(value: &str, default_port: u16) -> Result<SocketAddr, String> {
    if let Ok(addr) = SocketAddr::from_str(value) {
        return Ok(addr);
    }
    format!("{value}:{default_port}")
        .parse()
        .map_err(|e| format!("{e}"))
}

/// Reads the first `nameserver` line from `resolv_conf`, else `8.8.8.8`.
/// Mirrors `dnslib.py::get_default_resolver` in the source this config
/// surface was distilled from.
pub fn get_default_resolver(resolv_conf: impl AsRef<Path>) -> String {
    let contents = match std::fs::read_to_string(resolv_conf) {
        Ok(contents) => contents,
        Err(_) => return FALLBACK_UPSTREAM.to_string(),
    };

    for line in contents.lines() {
        let without_comment = line.split('#').next().unwrap_or("");
        let parts: Vec<&str> = without_comment.split_whitespace().collect();
        if parts.len() == 2 && parts[0] == "nameserver" {
            return parts[1].to_string();
        }
    }
    FALLBACK_UPSTREAM.to_string()
}
