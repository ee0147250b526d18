//! Configuration module for the dashbeat collector.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Dashboard API access (base URL, API key, timeout, retry policy)
//! - Collection (schedule, organizations, concurrency, metricsets)
//! - Event output (channel capacity, batching)

mod app;
mod collection;
mod validation;

pub use app::{ApiConfig, AppConfig, OutputConfig};
pub use collection::CollectionConfig;
pub use validation::{ConfigError, expand_env_vars, parse_duration};

// Re-export constants
pub use app::{DEFAULT_BASE_URL, DEFAULT_CHANNEL_CAPACITY, DEFAULT_TIMEOUT};
pub use collection::{DEFAULT_INTERVAL, DEFAULT_MAX_CONCURRENT_DEVICES};
