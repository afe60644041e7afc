//! Session service configuration.
//!
//! Configuration is loaded from environment variables. The provider API key
//! is held as a `SecretString` and redacted in Debug output.

use common::secret::SecretString;
use common::types::DEFAULT_MEDIA_REGION;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default timeout for a single provider API call, in seconds.
pub const DEFAULT_PROVIDER_TIMEOUT_SECONDS: u64 = 10;

/// Default connection drain period on shutdown, in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Session service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Media region for meetings whose join request names none.
    pub default_media_region: String,

    /// Base URL of the conferencing provider API.
    pub provider_api_url: String,

    /// Bearer credential for the provider API.
    pub provider_api_key: SecretString,

    /// Per-request timeout for provider calls.
    pub provider_timeout_seconds: u64,

    /// How long in-flight requests get to finish after a shutdown signal.
    /// Zero skips the drain.
    pub drain_seconds: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("default_media_region", &self.default_media_region)
            .field("provider_api_url", &self.provider_api_url)
            .field("provider_api_key", &"[REDACTED]")
            .field("provider_timeout_seconds", &self.provider_timeout_seconds)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid provider timeout configuration: {0}")]
    InvalidProviderTimeout(String),

    #[error("Invalid media region configuration: {0}")]
    InvalidMediaRegion(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainPeriod(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let provider_api_url = vars
            .get("PROVIDER_API_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("PROVIDER_API_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let provider_api_key = vars
            .get("PROVIDER_API_KEY")
            .map(|key| SecretString::from(key.clone()))
            .ok_or_else(|| ConfigError::MissingEnvVar("PROVIDER_API_KEY".to_string()))?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let default_media_region = vars
            .get("DEFAULT_MEDIA_REGION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_MEDIA_REGION.to_string());

        if default_media_region.trim().is_empty() {
            return Err(ConfigError::InvalidMediaRegion(
                "DEFAULT_MEDIA_REGION must not be empty".to_string(),
            ));
        }

        let provider_timeout_seconds =
            if let Some(value_str) = vars.get("PROVIDER_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidProviderTimeout(format!(
                        "PROVIDER_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidProviderTimeout(
                        "PROVIDER_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }

                value
            } else {
                DEFAULT_PROVIDER_TIMEOUT_SECONDS
            };

        let drain_seconds = match vars.get("SESSION_DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainPeriod(format!(
                    "SESSION_DRAIN_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => DEFAULT_DRAIN_SECONDS,
        };

        Ok(Config {
            bind_address,
            default_media_region,
            provider_api_url,
            provider_api_key,
            provider_timeout_seconds,
            drain_seconds,
        })
    }
}
