//! Minimal wire schema for the dashboard endpoints we consume.
//!
//! Every attribute the dashboard may omit or send as `null` is an `Option`.

use serde::{Deserialize, Deserializer};

/// Entry of `GET /organizations/{id}/devices`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub serial: Option<String>,
    pub name: Option<String>,
    pub mac: Option<String>,
    pub network_id: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub lan_ip: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub product_type: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub imei: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub details: Option<Vec<DeviceDetail>>,
}

/// Free-form name/value pair attached to a device.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceDetail {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Entry of `GET /organizations/{id}/devices/uplinksLossAndLatency`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkLossLatency {
    pub serial: Option<String>,
    pub network_id: Option<String>,
    pub uplink: Option<String>,
    pub ip: Option<String>,
    #[serde(default)]
    pub time_series: Vec<LossLatencyPoint>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LossLatencyPoint {
    pub ts: String,
    pub loss_percent: Option<f64>,
    pub latency_ms: Option<f64>,
}

/// Entry of `GET /organizations/{id}/appliance/uplink/statuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplianceUplinkStatus {
    pub serial: Option<String>,
    pub network_id: Option<String>,
    pub last_reported_at: Option<String>,
    pub high_availability: Option<HighAvailability>,
    #[serde(default)]
    pub uplinks: Vec<ApplianceUplink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HighAvailability {
    pub enabled: Option<bool>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplianceUplink {
    pub interface: Option<String>,
    pub status: Option<String>,
    pub ip: Option<String>,
    pub gateway: Option<String>,
    pub public_ip: Option<String>,
    pub primary_dns: Option<String>,
    pub secondary_dns: Option<String>,
    pub ip_assigned_by: Option<String>,
}

/// Entry of `GET /organizations/{id}/cellularGateway/uplink/statuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellularGatewayUplinkStatus {
    pub serial: Option<String>,
    pub network_id: Option<String>,
    pub last_reported_at: Option<String>,
    #[serde(default)]
    pub uplinks: Vec<CellularUplink>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellularUplink {
    pub interface: Option<String>,
    pub status: Option<String>,
    pub ip: Option<String>,
    pub provider: Option<String>,
    pub public_ip: Option<String>,
    pub model: Option<String>,
    pub signal_stat: Option<SignalStat>,
    pub connection_type: Option<String>,
    pub apn: Option<String>,
    pub gateway: Option<String>,
    pub dns1: Option<String>,
    pub dns2: Option<String>,
    pub signal_type: Option<String>,
    pub iccid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalStat {
    pub rsrp: Option<String>,
    pub rsrq: Option<String>,
}

/// Entry of `GET /organizations/{id}/devices/statuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub serial: Option<String>,
    pub network_id: Option<String>,
    pub status: Option<String>,
    pub last_reported_at: Option<String>,
    pub public_ip: Option<String>,
    pub lan_ip: Option<String>,
    pub gateway: Option<String>,
    pub ip_type: Option<String>,
    pub primary_dns: Option<String>,
    pub secondary_dns: Option<String>,
}

/// Body of `GET /organizations/{id}/devices/statuses/overview`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusOverview {
    pub counts: Option<DeviceStatusCounts>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusCounts {
    pub by_status: Option<CountsByStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountsByStatus {
    pub online: Option<u64>,
    pub alerting: Option<u64>,
    pub offline: Option<u64>,
    pub dormant: Option<u64>,
}

/// Body of `GET /devices/{serial}/appliance/performance`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliancePerformance {
    pub perf_score: Option<f64>,
}

/// Accept a number, a numeric string, or null.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_accepts_missing_and_null_fields() {
        let devices: Vec<Device> = serde_json::from_str(
            r#"[
                {"serial": "Q2AA-1", "model": "MX68", "lat": 37.4, "lng": -122.1, "imei": null},
                {"serial": "Q2AA-2", "imei": "356938035643809", "details": [{"name": "Catchall", "value": "x"}]}
            ]"#,
        )
        .unwrap();

        assert_eq!(devices[0].model.as_deref(), Some("MX68"));
        assert_eq!(devices[0].imei, None);
        assert_eq!(devices[0].tags, None);
        assert_eq!(devices[1].imei, Some(356938035643809.0));
        assert_eq!(devices[1].details.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_status_overview_decodes_partial_counts() {
        let overview: DeviceStatusOverview = serde_json::from_str(
            r#"{"counts": {"byStatus": {"online": 12, "alerting": 1, "offline": null}}}"#,
        )
        .unwrap();
        let by_status = overview.counts.and_then(|c| c.by_status).unwrap();
        assert_eq!(by_status.online, Some(12));
        assert_eq!(by_status.offline, None);
        assert_eq!(by_status.dormant, None);
    }

    #[test]
    fn test_uplink_loss_latency_decodes() {
        let entries: Vec<UplinkLossLatency> = serde_json::from_str(
            r#"[{"networkId": "N_1", "serial": "Q2AA-1", "uplink": "wan1", "ip": "8.8.8.8",
                 "timeSeries": [{"ts": "2024-03-01T10:00:00Z", "lossPercent": 0.0, "latencyMs": null}]}]"#,
        )
        .unwrap();

        assert_eq!(entries[0].time_series.len(), 1);
        assert_eq!(entries[0].time_series[0].loss_percent, Some(0.0));
        assert_eq!(entries[0].time_series[0].latency_ms, None);
    }
}
