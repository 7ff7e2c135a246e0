//! Scheduling policy and store-call configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, Result};
use crate::utilization::DEFAULT_HOURS_PER_DAY;

pub const ENV_HOURS_PER_DAY: &str = "ALLOC_HOURS_PER_DAY";
pub const ENV_STORE_TIMEOUT_MS: &str = "ALLOC_STORE_TIMEOUT_MS";
pub const ENV_DELETE_POLICY: &str = "ALLOC_DELETE_POLICY";
pub const ENV_MARK_SCHEDULED: &str = "ALLOC_MARK_SCHEDULED";

/// What happens to a resource's active allocations when it is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Refuse the delete while any active allocation references the resource.
    #[default]
    Reject,
    /// Cancel the active allocations (keeping them for audit), then delete.
    CascadeCancel,
}

impl std::str::FromStr for DeletePolicy {
    type Err = AllocationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(DeletePolicy::Reject),
            "cascade_cancel" | "cascade-cancel" => Ok(DeletePolicy::CascadeCancel),
            other => Err(AllocationError::InvalidConfig(format!(
                "unknown delete policy '{}'; expected reject or cascade_cancel",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Working hours per day used as utilization capacity.
    pub hours_per_day: f64,
    /// Upper bound on every individual store call.
    pub store_timeout_ms: u64,
    pub delete_policy: DeletePolicy,
    /// Set a resource's status to `scheduled` after it is booked.
    pub mark_resource_scheduled: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        SchedulingConfig {
            hours_per_day: DEFAULT_HOURS_PER_DAY,
            store_timeout_ms: 5_000,
            delete_policy: DeletePolicy::Reject,
            mark_resource_scheduled: true,
        }
    }
}

impl SchedulingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.hours_per_day > 0.0 && self.hours_per_day <= 24.0) {
            return Err(AllocationError::InvalidConfig(format!(
                "hours_per_day must be in (0, 24], got {}",
                self.hours_per_day
            )));
        }
        if self.store_timeout_ms == 0 {
            return Err(AllocationError::InvalidConfig(
                "store_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let cfg: SchedulingConfig = serde_json::from_str(input)
            .map_err(|e| AllocationError::InvalidConfig(format!("parse error: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `ALLOC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `ALLOC_*` key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = SchedulingConfig::default();
        if let Some(raw) = lookup(ENV_HOURS_PER_DAY) {
            cfg.hours_per_day = parse_env(ENV_HOURS_PER_DAY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STORE_TIMEOUT_MS) {
            cfg.store_timeout_ms = parse_env(ENV_STORE_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DELETE_POLICY) {
            cfg.delete_policy = raw.parse()?;
        }
        if let Some(raw) = lookup(ENV_MARK_SCHEDULED) {
            cfg.mark_resource_scheduled = parse_env(ENV_MARK_SCHEDULED, &raw)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AllocationError::InvalidConfig(format!("{}={:?}: {}", key, raw, e)))
}
