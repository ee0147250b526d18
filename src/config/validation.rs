//! Configuration errors and the helpers shared by every config section.

use std::sync::OnceLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;
use url::Url;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Config file is not valid YAML for [`AppConfig`](super::AppConfig).
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A value is out of range or inconsistent with another.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Validation error prefixed with the section it was found in.
    pub(crate) fn invalid(section: &str, message: impl std::fmt::Display) -> Self {
        Self::ValidationError(format!("{section}: {message}"))
    }
}

/// Reject zero for a count that must be positive.
pub(crate) fn require_positive(section: &str, field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(section, format!("{field} must be positive")));
    }
    Ok(())
}

/// Parse `raw` as an `http` or `https` URL.
pub(crate) fn require_http_url(section: &str, field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::invalid(section, format!("invalid {field} '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            section,
            format!("{field} must be http(s): '{raw}'"),
        ));
    }
    Ok(url)
}

/// Parse a humantime duration such as `30s`, `5m` or `1h30m`.
///
/// Used by the CLI for `--interval`.
///
/// ```
/// use dashbeat::config::parse_duration;
///
/// assert_eq!(parse_duration("90s").unwrap().as_secs(), 90);
/// assert_eq!(parse_duration(" 5m ").unwrap().as_secs(), 300);
/// assert!(parse_duration("").is_err());
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    match s.trim() {
        "" => Err("duration string is empty".to_string()),
        s => humantime::parse_duration(s).map_err(|e| e.to_string()),
    }
}

fn env_var_regex() -> &'static Regex {
    static ENV_VAR_REGEX: OnceLock<Regex> = OnceLock::new();
    ENV_VAR_REGEX.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    })
}

/// Expand `${VAR}` and `${VAR:-default}` references.
///
/// An unset variable without a default expands to the empty string and is
/// logged, so a missing `${MERAKI_API_KEY}` shows up before validation fails.
pub fn expand_env_vars(input: &str) -> String {
    env_var_regex()
        .replace_all(input, |caps: &Captures| {
            let name = &caps[1];
            match (std::env::var(name), caps.get(2)) {
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default.as_str().to_string(),
                (Err(_), None) => {
                    tracing::warn!(variable = name, "Config references unset environment variable");
                    String::new()
                }
            }
        })
        .into_owned()
}
