//! Relay configuration, read from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

/// Default largest relayed frame: 64 KiB.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RATE_PER_SEC: u64 = 10;
const DEFAULT_RATE_BURST: u32 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    /// `PORT`
    pub port: u16,
    /// `HOST`, loopback unless set.
    pub host: IpAddr,
    /// `ALLOWED_ORIGINS`, comma-separated. `None` lets every origin in.
    pub allowed_origins: Option<Vec<String>>,
    /// `REQUEST_TIMEOUT_SECS`. Covers the request up to the upgrade only.
    pub timeout_secs: u64,
    /// `RATE_LIMIT_ENABLED`. Off in `Default`, on when read from the environment.
    pub rate_limit_enabled: bool,
    /// `RATE_LIMIT_PER_SEC`
    pub rate_limit_per_sec: u64,
    /// `RATE_LIMIT_BURST`
    pub rate_limit_burst: u32,
    /// `MAX_FRAME_BYTES`, largest WebSocket message accepted from a peer.
    pub max_frame_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            allowed_origins: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            rate_limit_enabled: false,
            rate_limit_per_sec: DEFAULT_RATE_PER_SEC,
            rate_limit_burst: DEFAULT_RATE_BURST,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse<T: FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|v| v.trim().parse().ok())
}

/// Like [`parse`], but zero counts as unset. Limits of zero would stall
/// the rate limiter or refuse every frame.
fn parse_nonzero<T: FromStr + PartialEq + Default>(raw: Option<String>) -> Option<T> {
    parse(raw).filter(|n: &T| *n != T::default())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parse(env("PORT")).unwrap_or(defaults.port),
            host: parse(env("HOST")).unwrap_or(defaults.host),
            allowed_origins: env("ALLOWED_ORIGINS").map(|raw| parse_origins(&raw)),
            timeout_secs: parse(env("REQUEST_TIMEOUT_SECS")).unwrap_or(defaults.timeout_secs),
            rate_limit_enabled: env("RATE_LIMIT_ENABLED")
                .map(|v| !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            rate_limit_per_sec: parse_nonzero(env("RATE_LIMIT_PER_SEC"))
                .unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: parse_nonzero(env("RATE_LIMIT_BURST"))
                .unwrap_or(defaults.rate_limit_burst),
            max_frame_bytes: parse_nonzero(env("MAX_FRAME_BYTES"))
                .unwrap_or(defaults.max_frame_bytes),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
