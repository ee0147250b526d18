//! Cellular gateway uplink status.

use async_trait::async_trait;

use super::{Fields, MetricKind, MetricSample, UnmatchedPolicy, insert_opt};
use crate::api::{DashboardApi, wire};
use crate::collector::{CollectorError, FetchScope, MetricSet};
use crate::inventory::DeviceKey;

const PREFIX: &str = "device.uplink.cellular.gateway";

#[derive(Debug, Clone)]
pub struct CellularGatewayStatus {
    api: DashboardApi,
}

impl CellularGatewayStatus {
    pub fn new(api: DashboardApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MetricSet for CellularGatewayStatus {
    fn kind(&self) -> MetricKind {
        MetricKind::DeviceUplinksCellularGatewayStatus
    }

    fn unmatched_policy(&self) -> UnmatchedPolicy {
        UnmatchedPolicy::Drop
    }

    async fn fetch(&self, scope: &FetchScope<'_>) -> Result<Vec<MetricSample>, CollectorError> {
        let statuses = self.api.cellular_gateway_uplink_statuses(scope.target).await?;
        Ok(statuses.into_iter().map(sample_from_wire).collect())
    }
}

fn sample_from_wire(status: wire::CellularGatewayUplinkStatus) -> MetricSample {
    let mut sample = MetricSample::new(DeviceKey::from_wire(status.serial.as_deref()))
        .with_opt(&format!("{PREFIX}.network_id"), status.network_id)
        .with_opt(&format!("{PREFIX}.last_reported_at"), status.last_reported_at);

    for uplink in status.uplinks {
        let mut entry = Fields::new();
        let mut put = |name: &str, value: Option<String>| {
            insert_opt(&mut entry, &format!("{PREFIX}.{name}"), value);
        };
        put("interface", uplink.interface);
        put("status", uplink.status);
        put("ip", uplink.ip);
        put("provider", uplink.provider);
        put("public_ip", uplink.public_ip);
        put("model", uplink.model);
        put("connection_type", uplink.connection_type);
        put("apn", uplink.apn);
        put("gateway", uplink.gateway);
        put("dns1", uplink.dns1);
        put("dns2", uplink.dns2);
        put("signal_type", uplink.signal_type);
        put("iccid", uplink.iccid);
        if let Some(signal) = uplink.signal_stat {
            put("signal_stat.rsrp", signal.rsrp);
            put("signal_stat.rsrq", signal.rsrq);
        }
        sample = sample.with_entry(entry);
    }
    sample
}
