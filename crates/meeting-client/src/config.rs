//! Coordinator configuration.
//!
//! Defaults suit a browser session. `from_vars` lets embedders and tests
//! override the timings from an environment-style map.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default deadline for listing devices through the device manager.
pub const DEFAULT_ENUMERATION_TIMEOUT_MS: u64 = 3_000;

/// Default audio level sampling interval.
pub const DEFAULT_METER_INTERVAL_MS: u64 = 120;

/// Longest meter interval accepted; slower meters look frozen.
pub const MAX_METER_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Deadline for the device manager's three list calls combined.
    pub enumeration_timeout: Duration,

    /// How often the audio level is sampled.
    pub meter_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            enumeration_timeout: Duration::from_millis(DEFAULT_ENUMERATION_TIMEOUT_MS),
            meter_interval: Duration::from_millis(DEFAULT_METER_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid enumeration timeout configuration: {0}")]
    InvalidEnumerationTimeout(String),

    #[error("Invalid meter interval configuration: {0}")]
    InvalidMeterInterval(String),
}

impl CoordinatorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let enumeration_timeout_ms = match vars.get("DEVICE_ENUMERATION_TIMEOUT_MS") {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidEnumerationTimeout(format!(
                        "DEVICE_ENUMERATION_TIMEOUT_MS must be a valid positive integer, got '{value_str}': {e}"
                    ))
                })?;
                if value == 0 {
                    return Err(ConfigError::InvalidEnumerationTimeout(
                        "DEVICE_ENUMERATION_TIMEOUT_MS must be greater than 0".to_string(),
                    ));
                }
                value
            }
            None => DEFAULT_ENUMERATION_TIMEOUT_MS,
        };

        let meter_interval_ms = match vars.get("AUDIO_METER_INTERVAL_MS") {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidMeterInterval(format!(
                        "AUDIO_METER_INTERVAL_MS must be a valid positive integer, got '{value_str}': {e}"
                    ))
                })?;
                if value == 0 {
                    return Err(ConfigError::InvalidMeterInterval(
                        "AUDIO_METER_INTERVAL_MS must be greater than 0".to_string(),
                    ));
                }
                if value > MAX_METER_INTERVAL_MS {
                    return Err(ConfigError::InvalidMeterInterval(format!(
                        "AUDIO_METER_INTERVAL_MS must be at most {MAX_METER_INTERVAL_MS}, got {value}"
                    )));
                }
                value
            }
            None => DEFAULT_METER_INTERVAL_MS,
        };

        Ok(Self {
            enumeration_timeout: Duration::from_millis(enumeration_timeout_ms),
            meter_interval: Duration::from_millis(meter_interval_ms),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::from_vars(&HashMap::new()).unwrap();

        assert_eq!(config, CoordinatorConfig::default());
        assert_eq!(config.enumeration_timeout, Duration::from_secs(3));
        assert_eq!(config.meter_interval, Duration::from_millis(120));
    }

    #[test]
    fn test_overrides() {
        let config = CoordinatorConfig::from_vars(&vars(&[
            ("DEVICE_ENUMERATION_TIMEOUT_MS", "500"),
            ("AUDIO_METER_INTERVAL_MS", "50"),
        ]))
        .unwrap();

        assert_eq!(config.enumeration_timeout, Duration::from_millis(500));
        assert_eq!(config.meter_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = CoordinatorConfig::from_vars(&vars(&[("DEVICE_ENUMERATION_TIMEOUT_MS", "0")]))
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidEnumerationTimeout(msg) if msg.contains("greater than 0")));
    }

    #[test]
    fn test_non_numeric_timeout_rejected() {
        let err = CoordinatorConfig::from_vars(&vars(&[("DEVICE_ENUMERATION_TIMEOUT_MS", "soon")]))
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidEnumerationTimeout(_)));
    }

    #[test]
    fn test_meter_interval_bounds() {
        assert!(matches!(
            CoordinatorConfig::from_vars(&vars(&[("AUDIO_METER_INTERVAL_MS", "0")])),
            Err(ConfigError::InvalidMeterInterval(_))
        ));
        assert!(matches!(
            CoordinatorConfig::from_vars(&vars(&[("AUDIO_METER_INTERVAL_MS", "1001")])),
            Err(ConfigError::InvalidMeterInterval(_))
        ));
        assert!(CoordinatorConfig::from_vars(&vars(&[("AUDIO_METER_INTERVAL_MS", "1000")])).is_ok());
    }
}
