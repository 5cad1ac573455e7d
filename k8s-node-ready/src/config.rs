use std::time::Duration;

use constcat::concat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::ext::NumericalStdDuration as _;

use crate::duration;

pub const DEFAULT_EXPECTED_WORKERS: usize = 3;
pub const DEFAULT_QUERY_RETRIES: u32 = 10;

const ENV_PREFIX: &str = "NODE_READY_";
pub const ENV_EXPECTED_WORKERS: &str = concat!(ENV_PREFIX, "EXPECTED_WORKERS");
pub const ENV_POLL_INTERVAL: &str = concat!(ENV_PREFIX, "POLL_INTERVAL");
pub const ENV_PAUSE: &str = concat!(ENV_PREFIX, "PAUSE");
pub const ENV_QUERY_RETRIES: &str = concat!(ENV_PREFIX, "QUERY_RETRIES");
pub const ENV_QUERY_RETRY_DELAY: &str = concat!(ENV_PREFIX, "QUERY_RETRY_DELAY");

/// Tuning for the convergence loop.
///
/// `pause` is the settle delay before the first poll; `poll_interval` is the
/// steady cadence between subsequent polls. The query command itself gets
/// `query_retries` attempts per poll, `query_retry_delay` apart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConvergeConfig {
    pub expected_workers: usize,
    #[serde(with = "duration")]
    pub poll_interval: Duration,
    #[serde(with = "duration")]
    pub pause: Duration,
    pub query_retries: u32,
    #[serde(with = "duration")]
    pub query_retry_delay: Duration,
}

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self {
            expected_workers: DEFAULT_EXPECTED_WORKERS,
            poll_interval: 10.std_seconds(),
            pause: 10.std_seconds(),
            query_retries: DEFAULT_QUERY_RETRIES,
            query_retry_delay: 5.std_seconds(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ConvergeConfig {
    /// Build a config from `NODE_READY_*` environment variables.
    ///
    /// Unset or empty variables keep their defaults. A variable that is set
    /// but unparsable is an error rather than a silent fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name| lookup(name).filter(|value: &String| !value.is_empty());
        let mut config = Self::default();
        if let Some(raw) = var(ENV_EXPECTED_WORKERS) {
            config.expected_workers = raw
                .parse()
                .map_err(|err| ConfigError::invalid(ENV_EXPECTED_WORKERS, &raw, err))?;
        }
        if let Some(raw) = var(ENV_POLL_INTERVAL) {
            config.poll_interval = duration::parse(&raw)
                .map_err(|err| ConfigError::invalid(ENV_POLL_INTERVAL, &raw, err))?;
        }
        if let Some(raw) = var(ENV_PAUSE) {
            config.pause =
                duration::parse(&raw).map_err(|err| ConfigError::invalid(ENV_PAUSE, &raw, err))?;
        }
        if let Some(raw) = var(ENV_QUERY_RETRIES) {
            config.query_retries = raw
                .parse()
                .map_err(|err| ConfigError::invalid(ENV_QUERY_RETRIES, &raw, err))?;
        }
        if let Some(raw) = var(ENV_QUERY_RETRY_DELAY) {
            config.query_retry_delay = duration::parse(&raw)
                .map_err(|err| ConfigError::invalid(ENV_QUERY_RETRY_DELAY, &raw, err))?;
        }
        Ok(config)
    }
}
