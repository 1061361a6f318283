//! Configuration for the orchestration engine.
//!
//! All values have working defaults; they can be overridden via environment
//! variables:
//! - `UITASK_MAX_CONCURRENT_ACTIONS` - Global bound on in-flight actions. Defaults to `4`.
//! - `UITASK_MONITOR_INTERVAL_MS` - State-monitor polling interval. Defaults to `500`.
//! - `UITASK_PATTERN_CONFIDENCE` - Minimum confidence for substituting a matched
//!   interaction pattern for a plain action. Defaults to `0.8`.
//! - `UITASK_DEFAULT_TASK_TIMEOUT_SECS` - Timeout applied to tasks that do not
//!   set their own. Defaults to `300`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    /// Maximum number of actions allowed to mutate the environment at once.
    ///
    /// This caps concurrent environment mutation; it is not a throughput knob.
    pub max_concurrent_actions: usize,

    /// How often the background monitor samples state during a task.
    pub monitor_interval: Duration,

    /// Confidence threshold above which a matched pattern replaces an action.
    pub pattern_confidence_threshold: f64,

    /// Timeout for tasks that do not specify one.
    pub default_task_timeout: Duration,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_actions: 4,
            monitor_interval: Duration::from_millis(500),
            pattern_confidence_threshold: 0.8,
            default_task_timeout: Duration::from_secs(300),
        }
    }
}

impl AutomationConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("UITASK_MAX_CONCURRENT_ACTIONS") {
            config.max_concurrent_actions = raw.parse().map_err(|_| {
                ConfigError::InvalidValue("UITASK_MAX_CONCURRENT_ACTIONS".into(), raw.clone())
            })?;
        }

        if let Ok(raw) = std::env::var("UITASK_MONITOR_INTERVAL_MS") {
            let millis: u64 = raw.parse().map_err(|_| {
                ConfigError::InvalidValue("UITASK_MONITOR_INTERVAL_MS".into(), raw.clone())
            })?;
            config.monitor_interval = Duration::from_millis(millis);
        }

        if let Ok(raw) = std::env::var("UITASK_PATTERN_CONFIDENCE") {
            config.pattern_confidence_threshold = raw.parse().map_err(|_| {
                ConfigError::InvalidValue("UITASK_PATTERN_CONFIDENCE".into(), raw.clone())
            })?;
        }

        if let Ok(raw) = std::env::var("UITASK_DEFAULT_TASK_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                ConfigError::InvalidValue("UITASK_DEFAULT_TASK_TIMEOUT_SECS".into(), raw.clone())
            })?;
            config.default_task_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
