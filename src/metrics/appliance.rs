//! Security appliance uplink status and high availability.

use async_trait::async_trait;

use super::{Fields, MetricKind, MetricSample, UnmatchedPolicy, insert_opt};
use crate::api::{DashboardApi, wire};
use crate::collector::{CollectorError, FetchScope, MetricSet};
use crate::inventory::DeviceKey;

#[derive(Debug, Clone)]
pub struct ApplianceUplinkStatus {
    api: DashboardApi,
}

impl ApplianceUplinkStatus {
    pub fn new(api: DashboardApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MetricSet for ApplianceUplinkStatus {
    fn kind(&self) -> MetricKind {
        MetricKind::DeviceUplinksStatusAndHa
    }

    fn unmatched_policy(&self) -> UnmatchedPolicy {
        UnmatchedPolicy::Drop
    }

    async fn fetch(&self, scope: &FetchScope<'_>) -> Result<Vec<MetricSample>, CollectorError> {
        let statuses = self.api.appliance_uplink_statuses(scope.target).await?;
        Ok(statuses.into_iter().map(sample_from_wire).collect())
    }
}

/// One sample per appliance, one entry per uplink interface.
fn sample_from_wire(status: wire::ApplianceUplinkStatus) -> MetricSample {
    let ha = status.high_availability.as_ref();
    let mut sample = MetricSample::new(DeviceKey::from_wire(status.serial.as_deref()))
        .with_opt("device.uplink.high_availability.enabled", ha.and_then(|h| h.enabled))
        .with_opt("device.uplink.high_availability.role", ha.and_then(|h| h.role.clone()))
        .with_opt("device.uplink.network_id", status.network_id)
        .with_opt("device.uplink.last_reported_at", status.last_reported_at);

    for uplink in status.uplinks {
        let mut entry = Fields::new();
        insert_opt(&mut entry, "device.uplink.interface", uplink.interface);
        insert_opt(&mut entry, "device.uplink.status", uplink.status);
        insert_opt(&mut entry, "device.uplink.ip", uplink.ip);
        insert_opt(&mut entry, "device.uplink.gateway", uplink.gateway);
        insert_opt(&mut entry, "device.uplink.public_ip", uplink.public_ip);
        insert_opt(&mut entry, "device.uplink.primary_dns", uplink.primary_dns);
        insert_opt(&mut entry, "device.uplink.secondary_dns", uplink.secondary_dns);
        insert_opt(&mut entry, "device.uplink.ip_assigned_by", uplink.ip_assigned_by);
        sample = sample.with_entry(entry);
    }
    sample
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_has_one_entry_per_uplink() {
        let statuses: Vec<wire::ApplianceUplinkStatus> = serde_json::from_str(
            r#"[{"serial": "Q2-MX", "networkId": "N_1", "lastReportedAt": "2024-03-01T10:00:00Z",
                 "highAvailability": {"enabled": false, "role": "primary"},
                 "uplinks": [
                    {"interface": "wan1", "status": "active", "ip": "10.0.0.2", "publicIp": "1.2.3.4"},
                    {"interface": "wan2", "status": "ready", "ipAssignedBy": "dhcp"}
                 ]}]"#,
        )
        .unwrap();
        let sample = statuses.into_iter().map(sample_from_wire).next().unwrap();

        assert_eq!(sample.device_key, DeviceKey::parse("Q2-MX"));
        assert_eq!(
            sample.fields["device.uplink.high_availability.enabled"],
            serde_json::json!(false)
        );
        assert_eq!(sample.fields["device.uplink.network_id"], serde_json::json!("N_1"));
        assert_eq!(sample.entries.len(), 2);
        assert_eq!(sample.entries[0]["device.uplink.public_ip"], serde_json::json!("1.2.3.4"));
        assert!(!sample.entries[1].contains_key("device.uplink.ip"));
        assert_eq!(sample.entries[1]["device.uplink.ip_assigned_by"], serde_json::json!("dhcp"));
    }
}
