//! Process configuration loaded from the environment.
//!
//! Environment variables:
//! - `BIND_ADDR` (default: 0.0.0.0:3000)
//! - `FLIPSIDE_API_KEY` (required)
//! - `FLIPSIDE_BASE_URL` (default: https://api-v2.flipsidecrypto.xyz)
//! - `FLIPSIDE_POLL_INTERVAL_MS` (default: 2000)
//! - `FLIPSIDE_MAX_WAIT_SECS` (default: 300)
//! - `FLIPSIDE_REQUEST_TIMEOUT_SECS` (default: 30, per HTTP call)
//! - `FLIPSIDE_PAGE_SIZE` (default: 10000)
//!
//! Pipeline thresholds are not read here; they arrive per request.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_FLIPSIDE_BASE_URL: &str = "https://api-v2.flipsidecrypto.xyz";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlipsideConfig {
    pub api_key: String,
    pub base_url: String,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub request_timeout: Duration,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub flipside: FlipsideConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("FLIPSIDE_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("FLIPSIDE_API_KEY"))?;

        let poll_interval_ms: u64 = parse_or(&lookup, "FLIPSIDE_POLL_INTERVAL_MS", 2_000)?;
        let max_wait_secs: u64 = parse_or(&lookup, "FLIPSIDE_MAX_WAIT_SECS", 300)?;
        let request_timeout_secs: u64 = parse_or(&lookup, "FLIPSIDE_REQUEST_TIMEOUT_SECS", 30)?;
        let page_size: u32 = parse_or(&lookup, "FLIPSIDE_PAGE_SIZE", 10_000)?;

        if page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "FLIPSIDE_PAGE_SIZE",
                value: "0".to_string(),
            });
        }
        if request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "FLIPSIDE_REQUEST_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            flipside: FlipsideConfig {
                api_key,
                base_url: lookup("FLIPSIDE_BASE_URL").unwrap_or_else(|| DEFAULT_FLIPSIDE_BASE_URL.to_string()),
                poll_interval: Duration::from_millis(poll_interval_ms),
                max_wait: Duration::from_secs(max_wait_secs),
                request_timeout: Duration::from_secs(request_timeout_secs),
                page_size,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("FLIPSIDE_API_KEY", "secret")])).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.flipside.base_url, "https://api-v2.flipsidecrypto.xyz");
        assert_eq!(config.flipside.poll_interval, Duration::from_millis(2_000));
        assert_eq!(config.flipside.max_wait, Duration::from_secs(300));
        assert_eq!(config.flipside.request_timeout, Duration::from_secs(30));
        assert_eq!(config.flipside.page_size, 10_000);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("FLIPSIDE_API_KEY", "secret"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("FLIPSIDE_POLL_INTERVAL_MS", "500"),
            ("FLIPSIDE_MAX_WAIT_SECS", "60"),
            ("FLIPSIDE_PAGE_SIZE", "1000"),
            ("FLIPSIDE_REQUEST_TIMEOUT_SECS", "12"),
        ]))
        .unwrap();

        assert_eq!(config.flipside.request_timeout, Duration::from_secs(12));

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.flipside.poll_interval, Duration::from_millis(500));
        assert_eq!(config.flipside.max_wait, Duration::from_secs(60));
        assert_eq!(config.flipside.page_size, 1_000);
    }

    #[test]
    fn test_missing_api_key() {
        let err = AppConfig::from_lookup(lookup_from(&[("FLIPSIDE_API_KEY", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("FLIPSIDE_API_KEY"));
    }

    #[test]
    fn test_invalid_number() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("FLIPSIDE_API_KEY", "secret"),
            ("FLIPSIDE_MAX_WAIT_SECS", "soon"),
        ]))
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "FLIPSIDE_MAX_WAIT_SECS",
                value: "soon".to_string()
            }
        );
    }
}
