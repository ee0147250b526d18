//! Organization-wide device counts by status.

use async_trait::async_trait;

use super::{MetricKind, MetricSample, UnmatchedPolicy};
use crate::api::{DashboardApi, wire};
use crate::collector::{CollectorError, FetchScope, MetricSet};

/// Emits a single sample per organization with no device key.
#[derive(Debug, Clone)]
pub struct DeviceCounts {
    api: DashboardApi,
}

impl DeviceCounts {
    pub fn new(api: DashboardApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MetricSet for DeviceCounts {
    fn kind(&self) -> MetricKind {
        MetricKind::DeviceCounts
    }

    // Counts belong to the organization; `Drop` would discard every sample.
    fn unmatched_policy(&self) -> UnmatchedPolicy {
        UnmatchedPolicy::Degrade
    }

    async fn fetch(&self, scope: &FetchScope<'_>) -> Result<Vec<MetricSample>, CollectorError> {
        let overview = self.api.device_statuses_overview(scope.target).await?;
        Ok(vec![sample_from_wire(overview)])
    }
}

fn sample_from_wire(overview: wire::DeviceStatusOverview) -> MetricSample {
    let counts = overview.counts.and_then(|c| c.by_status).unwrap_or_default();
    MetricSample::new(None)
        .with_opt("device_counts.online", counts.online)
        .with_opt("device_counts.alerting", counts.alerting)
        .with_opt("device_counts.offline", counts.offline)
        .with_opt("device_counts.dormant", counts.dormant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::correlate;
    use crate::inventory::{Device, DeviceKey, Inventory};
    use chrono::Utc;
    use serde_json::json;

    fn overview(body: &str) -> wire::DeviceStatusOverview {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_counts_sample_has_no_device() {
        let sample = sample_from_wire(overview(
            r#"{"counts": {"byStatus": {"online": 40, "alerting": 2, "offline": 3, "dormant": 1}}}"#,
        ));

        assert_eq!(sample.device_key, None);
        assert_eq!(sample.fields["device_counts.online"], json!(40));
        assert_eq!(sample.fields["device_counts.alerting"], json!(2));
        assert_eq!(sample.fields["device_counts.offline"], json!(3));
        assert_eq!(sample.fields["device_counts.dormant"], json!(1));
    }

    #[test]
    fn test_missing_counts_yield_empty_sample() {
        let sample = sample_from_wire(overview(r#"{"counts": null}"#));
        assert!(sample.fields.is_empty());
    }

    #[test]
    fn test_counts_become_organization_event() {
        let inventory: Inventory = [Device::new(DeviceKey::parse("S1").unwrap()).with_model("X1")]
            .into_iter()
            .collect();
        let sample = sample_from_wire(overview(r#"{"counts": {"byStatus": {"online": 1}}}"#));
        let collected_at = Utc::now();

        let events = correlate(
            MetricKind::DeviceCounts,
            UnmatchedPolicy::Degrade,
            "org1",
            &inventory,
            &[sample],
            collected_at,
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, collected_at);
        assert_eq!(events[0].metricset, MetricKind::DeviceCounts);
        assert_eq!(events[0].fields["device_counts.online"], json!(1));
        assert!(!events[0].fields.keys().any(|k| k.starts_with("device.")));
    }
}
