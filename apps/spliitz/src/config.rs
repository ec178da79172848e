//! Server configuration.
//!
//! Host and port come from CLI flags. Optional hardening comes from the
//! environment:
//!
//! - `SPLIITZ_API_KEY`: when set, every route except `/health` requires
//!   `Authorization: Bearer <key>`
//! - `SPLIITZ_RATE_LIMIT`: requests per second across all clients

use std::env;
use std::num::NonZeroU32;
use thiserror::Error;

pub const API_KEY_VAR: &str = "SPLIITZ_API_KEY";
pub const RATE_LIMIT_VAR: &str = "SPLIITZ_RATE_LIMIT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer key for API access. `None` leaves the API open.
    pub api_key: Option<String>,
    /// Global request budget per second. `None` disables limiting.
    pub rate_limit: Option<NonZeroU32>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl ServerConfig {
    /// Open server on the given address with no key and no limit.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            api_key: None,
            rate_limit: None,
        }
    }

    pub fn from_env(host: impl Into<String>, port: u16) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: parse_api_key(env::var(API_KEY_VAR).ok()),
            rate_limit: parse_rate_limit(env::var(RATE_LIMIT_VAR).ok())?,
            ..Self::new(host, port)
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Blank keys are treated as unset so an empty variable never opens a
/// route to an empty bearer token.
pub fn parse_api_key(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Missing or blank means unlimited; anything else must be a positive
/// integer.
pub fn parse_rate_limit(value: Option<String>) -> Result<Option<NonZeroU32>, ConfigError> {
    let Some(raw) = value.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<NonZeroU32>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidNumber {
            var: RATE_LIMIT_VAR,
            value: raw,
        })
}
