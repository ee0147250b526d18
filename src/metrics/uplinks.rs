//! Uplink loss and latency time-series.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{FetchWindow, MetricKind, MetricSample, UnmatchedPolicy};
use crate::api::{DashboardApi, wire};
use crate::collector::{CollectorError, FetchScope, MetricSet, OrganizationTarget};
use crate::inventory::DeviceKey;

/// Per-uplink loss percentage and latency, sampled by the dashboard.
#[derive(Debug, Clone)]
pub struct UplinkLossLatency {
    api: DashboardApi,
}

impl UplinkLossLatency {
    pub fn new(api: DashboardApi) -> Self {
        Self { api }
    }

    /// Fetch samples for `window`, keeping only those the window owns.
    pub async fn fetch_time_series(
        &self,
        target: &OrganizationTarget,
        window: FetchWindow,
    ) -> Result<Vec<MetricSample>, CollectorError> {
        let entries = self.api.uplinks_loss_and_latency(target, window.span()).await?;
        samples_from_wire(entries, &window)
    }
}

#[async_trait]
impl MetricSet for UplinkLossLatency {
    fn kind(&self) -> MetricKind {
        MetricKind::DeviceUplinksLossAndLatency
    }

    fn unmatched_policy(&self) -> UnmatchedPolicy {
        UnmatchedPolicy::Drop
    }

    async fn fetch(&self, scope: &FetchScope<'_>) -> Result<Vec<MetricSample>, CollectorError> {
        self.fetch_time_series(scope.target, scope.window).await
    }
}

/// Flatten uplink series into one sample per measurement.
///
/// Measurements with neither loss nor latency are skipped. A timestamp that is
/// not RFC 3339 fails the whole fetch.
fn samples_from_wire(
    entries: Vec<wire::UplinkLossLatency>,
    window: &FetchWindow,
) -> Result<Vec<MetricSample>, CollectorError> {
    let mut samples = Vec::new();
    for entry in entries {
        let key = DeviceKey::from_wire(entry.serial.as_deref());
        for point in entry.time_series {
            if point.loss_percent.is_none() && point.latency_ms.is_none() {
                continue;
            }
            let ts = parse_timestamp(&point.ts)?;
            if !window.owns(ts) {
                continue;
            }
            samples.push(
                MetricSample::new(key.clone())
                    .at(ts)
                    .with_opt("uplink.ip", entry.ip.clone())
                    .with_opt("uplink.interface", entry.uplink.clone())
                    .with_opt("uplink.loss_percent", point.loss_percent)
                    .with_opt("uplink.latency_ms", point.latency_ms),
            );
        }
    }
    Ok(samples)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CollectorError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            CollectorError::MalformedPayload(format!(
                "invalid uplink sample timestamp '{raw}': {e}"
            ))
        })
}
