//! Signaling server configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults; nothing is required.

use huddle_media::EngineSettings;
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3001";

/// Default lower bound of the RTC port range.
pub const DEFAULT_RTC_MIN_PORT: u16 = 40_000;

/// Default upper bound of the RTC port range.
pub const DEFAULT_RTC_MAX_PORT: u16 = 49_999;

/// Signaling server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP/WebSocket bind address (default: "0.0.0.0:3001").
    pub bind_address: String,

    /// Publicly announced IP for ICE candidates, if any.
    pub announced_ip: Option<String>,

    /// Lower bound of the RTC port range (default: 40000).
    pub rtc_min_port: u16,

    /// Upper bound of the RTC port range (default: 49999).
    pub rtc_max_port: u16,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("HUDDLE_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let announced_ip = vars.get("HUDDLE_ANNOUNCED_IP").cloned();

        let rtc_min_port = parse_port(vars, "HUDDLE_RTC_MIN_PORT", DEFAULT_RTC_MIN_PORT)?;
        let rtc_max_port = parse_port(vars, "HUDDLE_RTC_MAX_PORT", DEFAULT_RTC_MAX_PORT)?;

        if rtc_min_port > rtc_max_port {
            return Err(ConfigError::InvalidValue(format!(
                "RTC port range is inverted: {rtc_min_port} > {rtc_max_port}"
            )));
        }

        Ok(Config {
            bind_address,
            announced_ip,
            rtc_min_port,
            rtc_max_port,
        })
    }

    /// Engine settings derived from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            announced_ip: self.announced_ip.clone(),
            rtc_min_port: self.rtc_min_port,
            rtc_max_port: self.rtc_max_port,
        }
    }
}

fn parse_port(
    vars: &HashMap<String, String>,
    name: &str,
    default: u16,
) -> Result<u16, ConfigError> {
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{name} is not a valid port: {raw}"))),
    }
}
