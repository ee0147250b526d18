//! Collection configuration.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::Schedule;
use crate::metrics::{DEFAULT_DEVICE_CONCURRENCY, MetricKind};

use super::validation::{ConfigError, require_positive};

/// Default collection interval (60 seconds).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Default bound on per-device requests in flight.
pub const DEFAULT_MAX_CONCURRENT_DEVICES: usize = DEFAULT_DEVICE_CONCURRENCY;

fn default_max_concurrent_devices() -> usize {
    DEFAULT_MAX_CONCURRENT_DEVICES
}

fn default_metricsets() -> Vec<MetricKind> {
    MetricKind::ALL.to_vec()
}

/// What to collect and how often.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Fixed interval between cycles. Defaults to 60s when no cron is given.
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,

    /// 6-field cron expression; exclusive with `interval`.
    #[serde(default)]
    pub cron: Option<String>,

    /// Organization identifiers to collect.
    pub organizations: Vec<String>,

    /// Organizations processed at once (default: unbounded).
    #[serde(default)]
    pub max_concurrent_organizations: Option<usize>,

    /// Per-device requests in flight for point-in-time metricsets (default: 4).
    #[serde(default = "default_max_concurrent_devices")]
    pub max_concurrent_devices: usize,

    /// Enabled metricsets (default: all).
    #[serde(default = "default_metricsets")]
    pub metricsets: Vec<MetricKind>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: None,
            cron: None,
            organizations: Vec::new(),
            max_concurrent_organizations: None,
            max_concurrent_devices: DEFAULT_MAX_CONCURRENT_DEVICES,
            metricsets: default_metricsets(),
        }
    }
}

impl CollectionConfig {
    /// Resolve the cycle schedule.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` when both interval and cron are
    /// set or the cron expression is invalid.
    pub fn schedule(&self) -> Result<Schedule, ConfigError> {
        match (&self.interval, &self.cron) {
            (Some(_), Some(_)) => Err(ConfigError::invalid(
                "collection",
                "set either interval or cron, not both",
            )),
            (_, Some(expr)) => {
                Schedule::cron(expr).map_err(|e| ConfigError::invalid("collection cron", e))
            }
            (interval, None) => Ok(Schedule::interval(interval.unwrap_or(DEFAULT_INTERVAL))),
        }
    }

    /// Validate collection settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schedule()?;

        if self.organizations.is_empty() {
            return Err(ConfigError::invalid(
                "collection",
                "at least one organization is required",
            ));
        }
        let mut seen = HashSet::new();
        for org in &self.organizations {
            if org.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "collection",
                    "organization id cannot be empty",
                ));
            }
            if !seen.insert(org.trim()) {
                return Err(ConfigError::invalid(
                    "collection",
                    format!("duplicate organization '{org}'"),
                ));
            }
        }

        if let Some(limit) = self.max_concurrent_organizations {
            require_positive("collection", "max_concurrent_organizations", limit)?;
        }
        require_positive(
            "collection",
            "max_concurrent_devices",
            self.max_concurrent_devices,
        )?;

        if self.metricsets.is_empty() {
            return Err(ConfigError::invalid(
                "collection",
                "at least one metricset is required",
            ));
        }
        let mut kinds = HashSet::new();
        for kind in &self.metricsets {
            if !kinds.insert(kind) {
                return Err(ConfigError::invalid(
                    "collection",
                    format!("duplicate metricset '{kind}'"),
                ));
            }
        }

        Ok(())
    }
}
