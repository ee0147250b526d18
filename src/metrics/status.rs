//! Device online/offline status.

use async_trait::async_trait;

use super::{MetricKind, MetricSample, UnmatchedPolicy};
use crate::api::{DashboardApi, wire};
use crate::collector::{CollectorError, FetchScope, MetricSet};
use crate::inventory::DeviceKey;

#[derive(Debug, Clone)]
pub struct DeviceStatusSet {
    api: DashboardApi,
}

impl DeviceStatusSet {
    pub fn new(api: DashboardApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MetricSet for DeviceStatusSet {
    fn kind(&self) -> MetricKind {
        MetricKind::DeviceStatus
    }

    // A status is worth reporting even for a device missing from the listing.
    fn unmatched_policy(&self) -> UnmatchedPolicy {
        UnmatchedPolicy::Degrade
    }

    async fn fetch(&self, scope: &FetchScope<'_>) -> Result<Vec<MetricSample>, CollectorError> {
        let statuses = self.api.device_statuses(scope.target).await?;
        Ok(statuses.into_iter().map(sample_from_wire).collect())
    }
}

fn sample_from_wire(status: wire::DeviceStatus) -> MetricSample {
    MetricSample::new(DeviceKey::from_wire(status.serial.as_deref()))
        .with_opt("device.status.serial", status.serial)
        .with_opt("device.status.network_id", status.network_id)
        .with_opt("device.status.status", status.status)
        .with_opt("device.status.last_reported_at", status.last_reported_at)
        .with_opt("device.status.public_ip", status.public_ip)
        .with_opt("device.status.lan_ip", status.lan_ip)
        .with_opt("device.status.gateway", status.gateway)
        .with_opt("device.status.ip_type", status.ip_type)
        .with_opt("device.status.primary_dns", status.primary_dns)
        .with_opt("device.status.secondary_dns", status.secondary_dns)
}
