//! Fetch window sizing.
//!
//! A cycle asks the dashboard for `period + WINDOW_MARGIN` of history so that a
//! late scheduler tick cannot open a hole between two cycles. Requests of
//! consecutive cycles therefore overlap; [`WindowCursor`] remembers where the
//! previous cycle stopped so each timestamp is emitted by exactly one cycle.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::MetricKind;

/// Extra history requested beyond the collection period.
pub const WINDOW_MARGIN: Duration = Duration::from_secs(10);

/// Time range requested from a time-series endpoint, plus the part this cycle owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    /// Exclusive lower bound of ownership; `None` owns from `start` inclusive.
    owned_after: Option<DateTime<Utc>>,
}

impl FetchWindow {
    /// Window of `period + WINDOW_MARGIN` ending at `end`.
    pub fn for_period(end: DateTime<Utc>, period: Duration) -> Self {
        let span = TimeDelta::from_std(period.saturating_add(WINDOW_MARGIN)).unwrap_or(TimeDelta::MAX);
        let start = end.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            start,
            end,
            owned_after: None,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Requested span (`end - start`).
    pub fn span(&self) -> Duration {
        (self.end - self.start).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether a sample at `ts` belongs to this cycle.
    pub fn owns(&self, ts: DateTime<Utc>) -> bool {
        if ts > self.end {
            return false;
        }
        match self.owned_after {
            Some(after) => ts > after,
            None => ts >= self.start,
        }
    }
}

/// Last emitted window end per organization and metricset.
#[derive(Debug, Default)]
pub struct WindowCursor {
    last_end: Mutex<HashMap<(String, MetricKind), DateTime<Utc>>>,
}

impl WindowCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Window for a cycle ending at `end`.
    ///
    /// Ownership starts where the previous committed window ended. If that end
    /// lies before the requested start, the gap is logged and ownership starts
    /// at the requested start.
    pub fn window(
        &self,
        organization: &str,
        kind: MetricKind,
        end: DateTime<Utc>,
        period: Duration,
    ) -> FetchWindow {
        let mut window = FetchWindow::for_period(end, period);
        let last = self
            .last_end
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(organization.to_string(), kind))
            .copied();

        if let Some(last) = last {
            if last < window.start {
                tracing::warn!(
                    organization,
                    metricset = %kind,
                    gap_ms = (window.start - last).num_milliseconds(),
                    "Collection cycle late; samples in the gap were not fetched"
                );
            } else {
                window.owned_after = Some(last);
            }
        }
        window
    }

    /// Record that `window` was emitted.
    pub fn commit(&self, organization: &str, kind: MetricKind, window: &FetchWindow) {
        let mut last_end = self.last_end.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = last_end
            .entry((organization.to_string(), kind))
            .or_insert(window.end);
        if window.end > *entry {
            *entry = window.end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const KIND: MetricKind = MetricKind::DeviceUplinksLossAndLatency;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_span_at_least_period() {
        for secs in [1, 30, 60, 300, 3600] {
            let period = Duration::from_secs(secs);
            let window = FetchWindow::for_period(t0(), period);
            assert!(window.span() >= period);
            assert_eq!(window.span(), period + WINDOW_MARGIN);
        }
    }

    #[test]
    fn test_first_window_owns_whole_span() {
        let cursor = WindowCursor::new();
        let window = cursor.window("org1", KIND, t0(), Duration::from_secs(60));

        assert!(window.owns(window.start()));
        assert!(window.owns(window.end()));
        assert!(!window.owns(window.start() - TimeDelta::milliseconds(1)));
        assert!(!window.owns(window.end() + TimeDelta::milliseconds(1)));
    }

    #[test]
    fn test_jittered_cycles_cover_every_timestamp_exactly_once() {
        let period = Duration::from_secs(60);
        // Scheduler jitter per tick, always below the margin.
        let jitter_secs = [0, 7, 2, 9, 0, 5, 9, 1, 3, 8];
        let cursor = WindowCursor::new();

        let mut windows = Vec::new();
        for (i, jitter) in jitter_secs.iter().enumerate() {
            let end = t0() + TimeDelta::seconds(60 * i as i64 + jitter);
            let window = cursor.window("org1", KIND, end, period);
            cursor.commit("org1", KIND, &window);
            windows.push(window);
        }

        let first = windows[0].start();
        let last = windows[windows.len() - 1].end();
        let mut ts = first;
        while ts <= last {
            let owners = windows.iter().filter(|w| w.owns(ts)).count();
            assert_eq!(owners, 1, "timestamp {ts} owned by {owners} cycles");
            ts += TimeDelta::milliseconds(250);
        }
    }

    #[test]
    fn test_requests_overlap_but_ownership_does_not() {
        let period = Duration::from_secs(60);
        let cursor = WindowCursor::new();

        let first = cursor.window("org1", KIND, t0(), period);
        cursor.commit("org1", KIND, &first);
        let second = cursor.window("org1", KIND, t0() + TimeDelta::seconds(60), period);

        // The second request reaches back before the first window ended ...
        assert!(second.start() < first.end());
        // ... but a sample in the overlap is emitted only once.
        let overlap = first.end() - TimeDelta::seconds(5);
        assert!(first.owns(overlap));
        assert!(!second.owns(overlap));
        assert!(second.owns(first.end() + TimeDelta::milliseconds(1)));
    }

    #[test]
    fn test_uncommitted_window_is_refetched() {
        let period = Duration::from_secs(60);
        let cursor = WindowCursor::new();

        let first = cursor.window("org1", KIND, t0(), period);
        cursor.commit("org1", KIND, &first);
        // Second cycle fails and never commits.
        let _failed = cursor.window("org1", KIND, t0() + TimeDelta::seconds(60), period);
        let third = cursor.window("org1", KIND, t0() + TimeDelta::seconds(65), period);

        assert!(third.owns(first.end() + TimeDelta::seconds(1)));
    }

    #[test]
    fn test_late_cycle_leaves_reported_gap() {
        let period = Duration::from_secs(60);
        let cursor = WindowCursor::new();

        let first = cursor.window("org1", KIND, t0(), period);
        cursor.commit("org1", KIND, &first);
        // Two minutes late: longer than period + margin.
        let late = cursor.window("org1", KIND, t0() + TimeDelta::seconds(180), period);

        let in_gap = first.end() + TimeDelta::seconds(30);
        assert!(!first.owns(in_gap));
        assert!(!late.owns(in_gap));
        assert!(late.owns(late.start()));
    }

    #[test]
    fn test_cursor_is_per_organization_and_kind() {
        let period = Duration::from_secs(60);
        let cursor = WindowCursor::new();

        let org1 = cursor.window("org1", KIND, t0(), period);
        cursor.commit("org1", KIND, &org1);

        let org2 = cursor.window("org2", KIND, t0(), period);
        let other_kind = cursor.window("org1", MetricKind::DeviceStatus, t0(), period);
        assert!(org2.owns(org2.start()));
        assert!(other_kind.owns(other_kind.start()));
    }
}
