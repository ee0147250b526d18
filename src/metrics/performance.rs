//! Security appliance performance score.
//!
//! The dashboard only offers this per device, so every appliance costs one
//! request. Requests fan out with a bounded concurrency and fail per device.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::{MetricKind, MetricSample, UnmatchedPolicy};
use crate::api::{ApiError, DashboardApi};
use crate::collector::{CollectorError, FetchScope, MetricSet, OrganizationTarget};
use crate::inventory::DeviceKey;

/// Default number of in-flight per-device requests.
pub const DEFAULT_DEVICE_CONCURRENCY: usize = 4;

/// Model prefix of devices that report a performance score.
const APPLIANCE_MODEL_PREFIX: &str = "MX";

const SCORE_FIELD: &str = "device.performance.score";
const STATUS_FIELD: &str = "device.performance.http_status_code";
const ERROR_FIELD: &str = "device.performance.error";

/// Appliance performance score (0-100), read per device.
#[derive(Debug, Clone)]
pub struct PerformanceScore {
    api: DashboardApi,
    concurrency: usize,
}

impl PerformanceScore {
    pub fn new(api: DashboardApi) -> Self {
        Self {
            api,
            concurrency: DEFAULT_DEVICE_CONCURRENCY,
        }
    }

    /// Set the number of in-flight requests (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Read the current score of every device in `keys`.
    ///
    /// A device whose request fails gets a degraded sample carrying the failure
    /// instead of aborting the others. Only cancellation aborts the fan-out.
    pub async fn fetch_point_in_time(
        &self,
        target: &OrganizationTarget,
        keys: &[DeviceKey],
    ) -> Result<BTreeMap<DeviceKey, MetricSample>, CollectorError> {
        // Owned inputs keep the fan-out future `Send` behind `async_trait`.
        let results: Vec<(DeviceKey, Result<(u16, Option<f64>), ApiError>)> =
            stream::iter(keys.to_vec())
                .map(|key| {
                    let api = self.api.clone();
                    let target = target.clone();
                    async move {
                        let result = api.appliance_performance(&target, key.as_str()).await;
                        (key, result)
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut samples = BTreeMap::new();
        for (key, result) in results {
            let sample = MetricSample::new(Some(key.clone()));
            let sample = match result {
                Ok((_, Some(score))) => sample.with_field(SCORE_FIELD, score),
                Ok((status, None)) => sample.with_field(STATUS_FIELD, status),
                Err(ApiError::Cancelled) => return Err(CollectorError::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        organization = %target.id,
                        serial = %key,
                        error = %e,
                        "Performance score fetch failed"
                    );
                    sample
                        .with_opt(STATUS_FIELD, e.status())
                        .with_field(ERROR_FIELD, e.to_string())
                }
            };
            samples.insert(key, sample);
        }
        Ok(samples)
    }
}

#[async_trait]
impl MetricSet for PerformanceScore {
    fn kind(&self) -> MetricKind {
        MetricKind::DevicePerformanceScore
    }

    // Keys come from the inventory, so every sample has a device.
    fn unmatched_policy(&self) -> UnmatchedPolicy {
        UnmatchedPolicy::Drop
    }

    async fn fetch(&self, scope: &FetchScope<'_>) -> Result<Vec<MetricSample>, CollectorError> {
        let keys = scope
            .inventory
            .keys_where(|d| d.model_starts_with(APPLIANCE_MODEL_PREFIX));
        let samples = self.fetch_point_in_time(scope.target, &keys).await?;
        Ok(samples.into_values().collect())
    }
}
