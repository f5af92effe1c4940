//! Process-wide settings read once from the environment.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::RelayError;

pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_BUFFER: usize = 8;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// `None` is reported per request, not at startup.
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub addr: SocketAddr,
    pub upstream_timeout: Option<Duration>,
    /// Capacity of the per-request output channel.
    pub buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            addr: ([127, 0, 0, 1], 3000).into(),
            upstream_timeout: None,
            buffer: DEFAULT_BUFFER,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let addr = get("RELAY_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| RelayError::Config(format!("RELAY_ADDR: {}", e)))?;

        let upstream_timeout = match get("RELAY_UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(raw.trim().parse::<u64>().map_err(
                |e| RelayError::Config(format!("RELAY_UPSTREAM_TIMEOUT_SECS: {}", e)),
            )?)),
            None => None,
        };

        let buffer = match get("RELAY_BUFFER") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    RelayError::Config(format!("RELAY_BUFFER must be a positive integer, got {:?}", raw))
                })?,
            None => DEFAULT_BUFFER,
        };

        Ok(RelayConfig {
            api_key: get("GROQ_API_KEY"),
            api_url: get("GROQ_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            model: get("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            addr,
            upstream_timeout,
            buffer,
        })
    }
}
