//! Configuration management for the task engine.
//!
//! Configuration can be set via environment variables:
//! - `TASKFLOW_DELAY_SCALE` - Optional. Multiplier for simulated handler latency. Defaults to `1.0`; `0` disables it.
//! - `TASKFLOW_RECOMMEND_JITTER` - Optional. Upper bound of the random score jitter. Defaults to `5.0`.
//! - `TASKFLOW_RECOMMEND_SEED` - Optional. Seed for the jitter RNG (deterministic rankings).
//! - `TASKFLOW_DATASET_PATH` - Optional. JSON file with creator records. Defaults to the built-in dataset.
//! - `TASKFLOW_EVENT_CAPACITY` - Optional. Capacity of the async event channel. Defaults to `256`.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::store::DEFAULT_EVENT_CAPACITY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Multiplier applied to every handler delay
    pub delay_scale: f64,

    /// Recommend jitter is drawn from `[0, recommend_jitter)`
    pub recommend_jitter: f64,

    /// Fixed RNG seed for recommend jitter
    pub recommend_seed: Option<u64>,

    /// Creator dataset file; `None` uses the built-in dataset
    pub dataset_path: Option<PathBuf>,

    /// Capacity of the broadcast event channel
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delay_scale: 1.0,
            recommend_jitter: 5.0,
            recommend_seed: None,
            dataset_path: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        _ => Ok(None),
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is set but does not
    /// parse, or a numeric value is negative.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let delay_scale = parse_env::<f64>("TASKFLOW_DELAY_SCALE")?.unwrap_or(defaults.delay_scale);
        if !(delay_scale >= 0.0 && delay_scale.is_finite()) {
            return Err(ConfigError::InvalidValue(
                "TASKFLOW_DELAY_SCALE".to_string(),
                format!("must be a non-negative number, got {}", delay_scale),
            ));
        }

        let recommend_jitter = parse_env::<f64>("TASKFLOW_RECOMMEND_JITTER")?
            .unwrap_or(defaults.recommend_jitter);
        if !(recommend_jitter >= 0.0 && recommend_jitter.is_finite()) {
            return Err(ConfigError::InvalidValue(
                "TASKFLOW_RECOMMEND_JITTER".to_string(),
                format!("must be a non-negative number, got {}", recommend_jitter),
            ));
        }

        Ok(Self {
            delay_scale,
            recommend_jitter,
            recommend_seed: parse_env("TASKFLOW_RECOMMEND_SEED")?,
            dataset_path: std::env::var("TASKFLOW_DATASET_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            event_capacity: parse_env("TASKFLOW_EVENT_CAPACITY")?.unwrap_or(defaults.event_capacity),
        })
    }

    /// No latency and no jitter, for tests and demos.
    pub fn for_tests() -> Self {
        Self {
            delay_scale: 0.0,
            recommend_jitter: 0.0,
            recommend_seed: Some(0),
            ..Self::default()
        }
    }
}
