//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use crate::collector::OrganizationTarget;

use super::collection::CollectionConfig;
use super::validation::{ConfigError, expand_env_vars, require_http_url, require_positive};

// =============================================================================
// Constants
// =============================================================================

/// Default dashboard API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.meraki.com";

/// Default per-request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default output channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);
const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_BATCH_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_initial_backoff() -> Duration {
    DEFAULT_INITIAL_BACKOFF
}

fn default_max_backoff() -> Duration {
    DEFAULT_MAX_BACKOFF
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_batch_flush_interval() -> Duration {
    DEFAULT_BATCH_FLUSH_INTERVAL
}

// =============================================================================
// API Configuration
// =============================================================================

/// Dashboard API access.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API base URL (default: "https://api.meraki.com").
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key, usually `${MERAKI_API_KEY}`.
    #[serde(default)]
    pub api_key: String,

    /// Per-request timeout (default: 30s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Attempts per request including the first (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1s).
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Cap for a single retry delay (default: 60s).
    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("max_backoff", &self.max_backoff)
            .finish()
    }
}

impl ApiConfig {
    /// Retry policy for the invoker.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).with_backoff(self.initial_backoff, self.max_backoff)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::invalid("api", "api_key is required"));
        }
        require_http_url("api", "base_url", &self.base_url)?;

        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("api", "max_attempts must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("api", "timeout must be positive"));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(ConfigError::invalid(
                "api",
                "initial_backoff cannot exceed max_backoff",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Output Configuration
// =============================================================================

/// Event output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Queue capacity before events are dropped (default: 10000).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Buffered events that trigger a write (default: 500).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum time events stay buffered (default: 1s).
    #[serde(default = "default_batch_flush_interval", with = "humantime_serde")]
    pub batch_flush_interval: Duration,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_flush_interval: DEFAULT_BATCH_FLUSH_INTERVAL,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Dashboard API access.
    #[serde(default)]
    pub api: ApiConfig,

    /// What to collect and how often.
    pub collection: CollectionConfig,

    /// Event output.
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file without validating it.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse YAML text without validating it.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(&expand_env_vars(content))?)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()?;
        self.collection.validate()?;

        require_positive("output", "channel_capacity", self.output.channel_capacity)?;
        require_positive("output", "batch_size", self.output.batch_size)
    }

    /// One target per configured organization, collected every `period`.
    pub fn targets(&self, period: Duration) -> Vec<OrganizationTarget> {
        self.collection
            .organizations
            .iter()
            .map(|id| {
                OrganizationTarget::new(id.trim(), &self.api.base_url, &self.api.api_key, period)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricKind;
    use std::io::Write;

    const MINIMAL: &str = "api:\n  api_key: k\ncollection:\n  organizations: ['123']\n";

    #[test]
    fn test_api_config_default() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_minimal_config_valid() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.output.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.collection.metricsets.len(), MetricKind::ALL.len());
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let config =
            AppConfig::from_yaml("collection:\n  organizations: ['123']\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config = AppConfig::from_yaml(MINIMAL).unwrap();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("base_url"));

        config.api.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = AppConfig::from_yaml(MINIMAL).unwrap();
        config.api.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_with_env_expansion() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "api:\n  api_key: ${{DASHBEAT_UNSET_KEY_FOR_TEST:-from-default}}\n  timeout: 10s\n\
             collection:\n  interval: 2m\n  organizations: ['1', '2']\n\
             output:\n  batch_flush_interval: 250ms\n"
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.api.api_key, "from-default");
        assert_eq!(config.api.timeout, Duration::from_secs(10));
        assert_eq!(config.output.batch_flush_interval, Duration::from_millis(250));

        let targets = config.targets(Duration::from_secs(120));
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].id, "2");
        assert_eq!(targets[1].api_key, "from-default");
        assert_eq!(targets[1].period, Duration::from_secs(120));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert!(!format!("{:?}", config.api).contains("api_key: \"k\""));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = ApiConfig::default();
        config.max_attempts = 3;
        config.initial_backoff = Duration::from_millis(100);
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
    }
}
