//! Retrying invocation of dashboard API requests.
//!
//! The dashboard enforces a per-organization request budget and answers with
//! `429 Too Many Requests` (plus an optional `Retry-After`) when it is spent.
//! [`RetryingInvoker`] absorbs those responses and transient transport failures,
//! sleeping between attempts, and only reports terminal outcomes.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::request::parse_next_link;
use super::{ApiError, ApiRequest, ApiResponse};

/// Default attempt budget per request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first retry (1 second).
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Default upper bound for a single backoff sleep (60 seconds).
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Floor for any backoff sleep so a misconfigured policy cannot spin.
const MIN_BACKOFF: Duration = Duration::from_millis(1);

/// Longest response body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Retry/backoff policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (minimum 1).
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles on every further attempt.
    pub initial_backoff: Duration,
    /// Cap for any single sleep, including server hints.
    pub max_backoff: Duration,
    /// Add up to 50% random jitter to computed (non-hinted) delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget (clamped to at least 1).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Set the backoff curve bounds.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Disable jitter (deterministic delays).
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay to wait after failed `attempt` (1-based).
    ///
    /// A server-supplied hint wins over the exponential curve; both are capped
    /// by `max_backoff` and floored at 1ms.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let delay = match hint {
            Some(hint) => hint,
            None => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                let base = self.initial_backoff.saturating_mul(factor).min(self.max_backoff);
                if self.jitter && !base.is_zero() {
                    let extra_ms = rand::rng().random_range(0..=base.as_millis() as u64 / 2);
                    base + Duration::from_millis(extra_ms)
                } else {
                    base
                }
            }
        };
        delay.min(self.max_backoff).max(MIN_BACKOFF)
    }
}

/// Raw HTTP outcome before retry classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Parsed `Retry-After` header.
    pub retry_after: Option<Duration>,
    /// Parsed `Link: <...>; rel=next` header.
    pub next_page: Option<String>,
    pub body: String,
}

impl RawResponse {
    /// Response with a status and body, no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            next_page: None,
            body: body.into(),
        }
    }

    /// Set the `Retry-After` hint.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// Set the next page link.
    pub fn with_next_page(mut self, url: impl Into<String>) -> Self {
        self.next_page = Some(url.into());
        self
    }
}

/// Transport-level failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection reset, timeout, body read interrupted. Retried.
    #[error("transient transport failure: {0}")]
    Transient(String),

    /// Request could not be built or sent at all. Not retried.
    #[error("transport failure: {0}")]
    Fatal(String),
}

/// Sends one HTTP request; no retries.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError>;
}

/// Issues a request and returns a decoded response or a terminal error.
#[async_trait]
pub trait Invoker: Send + Sync + 'static {
    async fn invoke(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport with a per-request timeout.
    ///
    /// # Errors
    /// Returns `TransportError::Fatal` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dashbeat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Fatal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self.client.get(&request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response.headers();
        let retry_after = headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let next_page = headers
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Transient(format!("failed to read body: {e}")))?;

        Ok(RawResponse {
            status,
            retry_after,
            next_page,
            body,
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_builder() {
        TransportError::Fatal(e.to_string())
    } else {
        TransportError::Transient(e.to_string())
    }
}

/// Parse `Retry-After` as delta-seconds or an HTTP date.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Ok(secs) = value.parse::<f64>() {
        // Out-of-range hints saturate; `delay_for` caps them at `max_backoff`.
        return (secs.is_finite() && secs >= 0.0)
            .then(|| Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX));
    }
    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = at.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

/// Statuses that indicate a temporary upstream condition.
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Invoker that retries rate-limited and transient failures.
///
/// Backoff sleeps are aborted when the cancellation token fires.
pub struct RetryingInvoker<T: Transport = ReqwestTransport> {
    transport: T,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<T: Transport> RetryingInvoker<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight backoff when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<T: Transport> std::fmt::Debug for RetryingInvoker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingInvoker")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: Transport> Invoker for RetryingInvoker<T> {
    async fn invoke(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let described = request.describe();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last = String::new();

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let hint = match self.transport.send(request).await {
                Ok(raw) if (200..300).contains(&raw.status) => {
                    tracing::trace!(request = %described, status = raw.status, attempt, "Request succeeded");
                    return Ok(ApiResponse {
                        request: described,
                        status: raw.status,
                        body: raw.body,
                        attempts: attempt,
                        next_page: raw.next_page,
                    });
                }
                Ok(raw) if is_retryable_status(raw.status) => {
                    if raw.status == 429 {
                        tracing::warn!(request = %described, attempt, retry_after = ?raw.retry_after, "Rate limited");
                    } else {
                        tracing::debug!(request = %described, attempt, status = raw.status, "Upstream unavailable");
                    }
                    last = format!("status {}", raw.status);
                    raw.retry_after
                }
                Ok(raw) => {
                    return Err(ApiError::Status {
                        request: described,
                        status: raw.status,
                        body: truncate_body(&raw.body),
                    });
                }
                Err(TransportError::Transient(reason)) => {
                    tracing::debug!(request = %described, attempt, error = %reason, "Transient transport failure");
                    last = reason;
                    None
                }
                Err(TransportError::Fatal(reason)) => {
                    return Err(ApiError::Transport {
                        request: described,
                        reason,
                    });
                }
            };

            if attempt == max_attempts {
                break;
            }

            let delay = self.policy.delay_for(attempt, hint);
            tracing::debug!(request = %described, attempt, delay_ms = delay.as_millis() as u64, "Backing off");
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Err(ApiError::Exhausted {
            request: described,
            attempts: max_attempts,
            last,
        })
    }
}
