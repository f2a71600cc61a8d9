//! Engine configuration.
//!
//! Periods are counted in host ticks and converted to wall-clock time with
//! [`EngineConfig::host_tick_ms`].

use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::engine::TickBudget;
use crate::error::{ConfigError, RelightResult};
use crate::policy::RelightPolicy;
use crate::service::DEFAULT_QUEUE_CAPACITY;

/// Scheduler tuning. Every field has a default, so partial JSON is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Host ticks between background queue drains.
    pub tick_period_ticks: u32,
    /// Wall-clock budget per queue per drain, in milliseconds.
    pub max_time_ms_per_tick: u64,
    /// Request budget per queue per drain.
    pub max_requests_per_tick: usize,
    /// When synchronous edits recalculate.
    pub relight_policy: RelightPolicy,
    /// Background worker threads.
    pub core_pool_size: usize,
    /// Jobs that may wait for a free worker.
    pub worker_queue_capacity: usize,
    /// Host ticks between observer flushes.
    pub observer_tick_period_ticks: u32,
    /// Length of one host tick, in milliseconds.
    pub host_tick_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period_ticks: 2,
            max_time_ms_per_tick: 50,
            max_requests_per_tick: 256,
            relight_policy: RelightPolicy::Deferred,
            core_pool_size: 1,
            worker_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            observer_tick_period_ticks: 2,
            host_tick_ms: 50,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON document. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> RelightResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would stall the scheduler.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 7] = [
            ("tick_period_ticks", self.tick_period_ticks == 0),
            ("max_time_ms_per_tick", self.max_time_ms_per_tick == 0),
            ("max_requests_per_tick", self.max_requests_per_tick == 0),
            ("core_pool_size", self.core_pool_size == 0),
            ("worker_queue_capacity", self.worker_queue_capacity == 0),
            ("observer_tick_period_ticks", self.observer_tick_period_ticks == 0),
            ("host_tick_ms", self.host_tick_ms == 0),
        ];
        for (field, is_zero) in checks {
            if is_zero {
                warn!("rejected engine config: {field} is zero");
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Per-queue drain budget.
    #[must_use]
    pub fn budget(&self) -> TickBudget {
        TickBudget {
            max_time: self.max_time_per_tick(),
            max_requests: self.max_requests_per_tick,
        }
    }

    /// [`EngineConfig::max_time_ms_per_tick`] as a duration.
    #[must_use]
    pub const fn max_time_per_tick(&self) -> Duration {
        Duration::from_millis(self.max_time_ms_per_tick)
    }

    /// Delay between background queue drains.
    #[must_use]
    pub fn engine_period(&self) -> Duration {
        self.ticks(self.tick_period_ticks)
    }

    /// Delay between observer flushes.
    #[must_use]
    pub fn observer_period(&self) -> Duration {
        self.ticks(self.observer_tick_period_ticks)
    }

    fn ticks(&self, count: u32) -> Duration {
        Duration::from_millis(self.host_tick_ms.saturating_mul(u64::from(count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.budget().max_requests, 256);
        assert_eq!(config.engine_period(), Duration::from_millis(100));
        assert_eq!(config.observer_period(), Duration::from_millis(100));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = EngineConfig::from_json_str(r#"{"max_requests_per_tick": 8, "relight_policy": "forward"}"#).unwrap();
        assert_eq!(config.max_requests_per_tick, 8);
        assert_eq!(config.relight_policy, RelightPolicy::Forward);
        assert_eq!(config.max_time_ms_per_tick, 50);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{"max_requests_per_tick": 0}"#).unwrap_err();
        assert!(err.is_config());
        assert!(format!("{err}").contains("max_requests_per_tick"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(err.is_config());
        assert!(format!("{err}").contains("parse"));
    }
}
