//! Metricset seam, fetch scope, schedule and collector errors.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::api::ApiError;
use crate::inventory::Inventory;
use crate::metrics::{FetchWindow, MetricKind, MetricSample, UnmatchedPolicy};

/// Shortest interval between cycles.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Failure of an inventory resolution, a metricset fetch or a job setup.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Upstream call failed after the invoker gave up.
    #[error("upstream error: {0}")]
    Upstream(#[from] ApiError),

    /// Payload decoded but carried unusable data.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Invalid schedule or collection setting.
    #[error("config error: {0}")]
    Config(String),

    /// `tokio-cron-scheduler` refused a job or failed to start or stop.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// The cycle was cancelled.
    #[error("collection cancelled")]
    Cancelled,
}

impl CollectorError {
    /// Whether the failure comes from a cancellation rather than upstream.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Upstream(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

/// When collection cycles run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Every `Duration`, first tick one interval after start.
    Interval(Duration),

    /// 6-field cron expression (`sec min hour day month weekday`), in UTC.
    Cron(String),
}

impl Schedule {
    /// Interval schedule, raised to [`MIN_INTERVAL`] if shorter.
    pub fn interval(duration: Duration) -> Self {
        if duration >= MIN_INTERVAL {
            return Self::Interval(duration);
        }
        tracing::warn!(
            requested = ?duration,
            min_interval = ?MIN_INTERVAL,
            "Collection interval too short; using minimum"
        );
        Self::Interval(MIN_INTERVAL)
    }

    /// Cron schedule, validated up front.
    ///
    /// # Errors
    /// `CollectorError::Config` when `expr` does not parse.
    pub fn cron(expr: impl AsRef<str>) -> Result<Self, CollectorError> {
        let expr = expr.as_ref();
        parse_cron(expr)?;
        Ok(Self::Cron(expr.to_string()))
    }

    /// Collection period used to size fetch windows.
    ///
    /// For cron schedules this is the longest gap between consecutive fire
    /// times over the next [`CRON_PERIOD_HORIZON`], so irregular expressions
    /// such as `0 0 9,17 * * *` get a window covering their longest gap.
    pub fn period(&self) -> Result<Duration, CollectorError> {
        match self {
            Self::Interval(d) => Ok(*d),
            Self::Cron(expr) => longest_cron_gap(&parse_cron(expr)?, Utc::now())
                .map(|gap| gap.max(MIN_INTERVAL))
                .ok_or_else(|| {
                    CollectorError::Config(format!(
                        "cron expression '{expr}' does not fire repeatedly"
                    ))
                }),
        }
    }
}

/// Span of upcoming fire times inspected for a cron period; covers weekly patterns.
pub const CRON_PERIOD_HORIZON: Duration = Duration::from_secs(8 * 24 * 60 * 60);

/// Upper bound on fire times inspected, for sub-minute expressions.
const CRON_PERIOD_MAX_FIRES: usize = 100_000;

/// Longest gap between consecutive fires after `from`, `None` if it fires less than twice.
fn longest_cron_gap(schedule: &cron::Schedule, from: DateTime<Utc>) -> Option<Duration> {
    let horizon = chrono::TimeDelta::from_std(CRON_PERIOD_HORIZON).ok()?;
    let mut fires = schedule.after(&from).take(CRON_PERIOD_MAX_FIRES);
    let first = fires.next()?;
    let until = first + horizon;

    let mut previous = first;
    let mut longest: Option<Duration> = None;
    for fire in fires {
        let gap = (fire - previous).to_std().unwrap_or(Duration::ZERO);
        longest = Some(longest.map_or(gap, |l| l.max(gap)));
        previous = fire;
        if fire >= until {
            break;
        }
    }
    longest
}

fn parse_cron(expr: &str) -> Result<cron::Schedule, CollectorError> {
    cron::Schedule::from_str(expr)
        .map_err(|e| CollectorError::Config(format!("invalid cron expression: {e}")))
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interval(d) => write!(f, "every {:?}", d),
            Self::Cron(expr) => write!(f, "cron: {}", expr),
        }
    }
}

/// One organization to collect, with what is needed to address the dashboard.
#[derive(Clone)]
pub struct OrganizationTarget {
    pub id: String,
    pub base_url: String,
    pub api_key: String,
    /// Collection period; fetch windows are sized from it.
    pub period: Duration,
}

impl OrganizationTarget {
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        period: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            period,
        }
    }
}

impl std::fmt::Debug for OrganizationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganizationTarget")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("period", &self.period)
            .finish()
    }
}

/// What a metricset sees of the current cycle for one organization.
#[derive(Debug, Clone, Copy)]
pub struct FetchScope<'a> {
    pub target: &'a OrganizationTarget,
    pub inventory: &'a Inventory,
    /// Window for time-series endpoints; point-in-time sets ignore it.
    pub window: FetchWindow,
    /// Cycle instant; samples without their own timestamp get this one.
    pub collected_at: DateTime<Utc>,
}

/// One dynamic metric stream.
///
/// Implementations fetch through the dashboard API and return samples keyed by
/// device serial. They never correlate; the orchestrator does.
///
/// # Error Handling
///
/// - **Per-device failures** of point-in-time reads are data: they come back as
///   samples carrying the failure, and `fetch()` returns `Ok`.
/// - **Stream failures** (terminal upstream error, malformed payload) return
///   `Err` and fail this metricset for this organization only.
#[async_trait]
pub trait MetricSet: Send + Sync + 'static {
    fn kind(&self) -> MetricKind;

    /// What correlation does with samples whose device is not in the inventory.
    fn unmatched_policy(&self) -> UnmatchedPolicy;

    async fn fetch(&self, scope: &FetchScope<'_>) -> Result<Vec<MetricSample>, CollectorError>;
}
