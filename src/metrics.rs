//! Dynamic metric streams.
//!
//! Each metricset fetches one vendor stream and turns it into [`MetricSample`]s
//! keyed by device serial:
//!
//! - [`UplinkLossLatency`]: time-series, window bounded
//! - [`PerformanceScore`]: point-in-time, one call per appliance
//! - [`ApplianceUplinkStatus`], [`CellularGatewayStatus`], [`DeviceStatusSet`]: organization snapshots
//! - [`DeviceCounts`]: one organization-level sample, no device

mod appliance;
mod cellular;
mod counts;
mod performance;
mod sample;
mod status;
mod uplinks;
mod window;

pub use appliance::ApplianceUplinkStatus;
pub use cellular::CellularGatewayStatus;
pub use counts::DeviceCounts;
pub use performance::{DEFAULT_DEVICE_CONCURRENCY, PerformanceScore};
pub use sample::{Fields, MetricKind, MetricSample, UnmatchedPolicy, insert_opt};
pub use status::DeviceStatusSet;
pub use uplinks::UplinkLossLatency;
pub use window::{FetchWindow, WINDOW_MARGIN, WindowCursor};

use std::sync::Arc;

use crate::api::DashboardApi;
use crate::collector::MetricSet;

/// Build the metricset implementation for `kind`.
pub fn build(kind: MetricKind, api: DashboardApi, device_concurrency: usize) -> Arc<dyn MetricSet> {
    match kind {
        MetricKind::DeviceUplinksLossAndLatency => Arc::new(UplinkLossLatency::new(api)),
        MetricKind::DevicePerformanceScore => {
            Arc::new(PerformanceScore::new(api).with_concurrency(device_concurrency))
        }
        MetricKind::DeviceUplinksStatusAndHa => Arc::new(ApplianceUplinkStatus::new(api)),
        MetricKind::DeviceUplinksCellularGatewayStatus => Arc::new(CellularGatewayStatus::new(api)),
        MetricKind::DeviceStatus => Arc::new(DeviceStatusSet::new(api)),
        MetricKind::DeviceCounts => Arc::new(DeviceCounts::new(api)),
    }
}
