use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Largest request body accepted, in bytes
    pub max_body_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "AGRISYNC_API_BIND_ADDR", "127.0.0.1:8080")
            .parse::<SocketAddr>()
            .map_err(|error| {
                ConfigError::Invalid(format!("AGRISYNC_API_BIND_ADDR must be host:port: {error}"))
            })?;

        let max_body_bytes = value_or_default(&lookup, "AGRISYNC_API_MAX_BODY_BYTES", "65536")
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "AGRISYNC_API_MAX_BODY_BYTES must be an integer in [1024, 10485760]"
                        .to_string(),
                )
            })?;
        if !(1_024..=10_485_760).contains(&max_body_bytes) {
            return Err(ConfigError::Invalid(
                "AGRISYNC_API_MAX_BODY_BYTES must be in [1024, 10485760]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            max_body_bytes,
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
