//! Engine configuration.
//!
//! Only client-side tunables live here. Caps and the rate schedule belong to
//! the ledger and are read from it at runtime.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anchor_lang::prelude::Pubkey;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    DEFAULT_ALLOWED_STAKING_PERIODS_DAYS, DEFAULT_REFRESH_INTERVAL_MILLIS,
    DEFAULT_STALENESS_WINDOW_SECS, SECONDS_PER_DAY,
};
use crate::error::{EngineError, Result};
use crate::orchestrator::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base58 address allowed to move staked tokens (the staking program)
    pub spender: String,

    /// How long a registry entry is served without an upstream read
    /// Default: 300 seconds
    pub staleness_window_secs: u64,

    /// Interval of the display yield ticker
    /// Default: 1000 ms
    pub refresh_interval_millis: u64,

    /// Lock durations offered to users, in days
    /// Default: 30, 60, 90
    pub allowed_staking_periods_days: Vec<u32>,

    /// Caller-invoked retry strategy
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            spender: crate::ID.to_string(),
            staleness_window_secs: DEFAULT_STALENESS_WINDOW_SECS,
            refresh_interval_millis: DEFAULT_REFRESH_INTERVAL_MILLIS,
            allowed_staking_periods_days: DEFAULT_ALLOWED_STAKING_PERIODS_DAYS.to_vec(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading engine config from {}", path.display());
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.spender()?;

        if self.staleness_window_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "Staleness window must be greater than zero".to_string(),
            ));
        }

        if self.refresh_interval_millis == 0 {
            return Err(EngineError::InvalidConfig(
                "Refresh interval must be greater than zero".to_string(),
            ));
        }

        if self.allowed_staking_periods_days.is_empty() {
            return Err(EngineError::InvalidConfig(
                "At least one staking period must be allowed".to_string(),
            ));
        }

        if self.allowed_staking_periods_days.contains(&0) {
            return Err(EngineError::InvalidConfig(
                "Staking periods must be at least one day".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "Retry attempts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn spender(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.spender)
            .map_err(|e| EngineError::InvalidConfig(format!("spender {}: {}", self.spender, e)))
    }

    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_window_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_millis)
    }

    /// Allowed staking periods in seconds.
    pub fn allowed_staking_periods(&self) -> Vec<i64> {
        self.allowed_staking_periods_days
            .iter()
            .map(|days| i64::from(*days) * SECONDS_PER_DAY)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.spender().unwrap(), crate::ID);
        assert_eq!(config.staleness_window(), Duration::from_secs(300));
        assert_eq!(
            config.allowed_staking_periods(),
            vec![30 * SECONDS_PER_DAY, 60 * SECONDS_PER_DAY, 90 * SECONDS_PER_DAY]
        );
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "staleness_window_secs": 60, "retry": { "max_attempts": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.staleness_window_secs, 60);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff_millis, RetryPolicy::default().backoff_millis);
        assert_eq!(config.refresh_interval(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_rejects_invalid_values() {
        for json in [
            r#"{ "staleness_window_secs": 0 }"#,
            r#"{ "allowed_staking_periods_days": [] }"#,
            r#"{ "allowed_staking_periods_days": [30, 0] }"#,
            r#"{ "spender": "not-a-key" }"#,
            r#"{ "retry": { "max_attempts": 0 } }"#,
            r#"{ "staleness_window_secs": "soon" }"#,
        ] {
            assert!(
                matches!(EngineConfig::from_json_str(json), Err(EngineError::InvalidConfig(_))),
                "{} should be rejected",
                json
            );
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/nonexistent/stake-engine.json").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }
}
