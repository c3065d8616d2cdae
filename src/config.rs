//! Environment configuration.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `ADDR` | listen address, `host:port` or `:port` | `:8080` |
//! | `LOG_LEVEL` | minimum severity written to stdout | `info` |

use std::str::FromStr;

use tracing_subscriber::filter::LevelFilter;

pub const DEFAULT_ADDR: &str = ":8080";

/// Runtime settings, read once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Listen address as configured, e.g. `:8080`. Logged as is; bind with
    /// [`bind_addr`](Config::bind_addr).
    pub addr: String,
    pub log_level: LevelFilter,
}

impl Config {
    /// Reads `ADDR` and `LOG_LEVEL` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let addr = lookup("ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ADDR.to_owned());
        let log_level = lookup("LOG_LEVEL")
            .map(|v| parse_level(&v))
            .unwrap_or(LevelFilter::INFO);

        Self { addr, log_level }
    }

    /// The address to hand to [`Server::bind`](crate::Server::bind): a bare
    /// `:port` becomes `0.0.0.0:port`, anything else is left alone.
    pub fn bind_addr(&self) -> String {
        if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Parses a severity name. Unknown or empty names mean `info`.
///
/// Besides the five tracing levels, `fatal` and `panic` map to `error`, and
/// `disabled` turns output off.
pub fn parse_level(raw: &str) -> LevelFilter {
    let name = raw.trim().to_ascii_lowercase();
    match name.as_str() {
        "fatal" | "panic" => LevelFilter::ERROR,
        "disabled" => LevelFilter::OFF,
        "" => LevelFilter::INFO,
        other => LevelFilter::from_str(other).unwrap_or(LevelFilter::INFO),
    }
}
