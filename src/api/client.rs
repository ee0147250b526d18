//! Typed dashboard endpoints.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use super::{ApiError, ApiRequest, Invoker, wire};
use crate::collector::OrganizationTarget;

/// Page size requested from paginated list endpoints.
const PAGE_SIZE: &str = "1000";

/// Upper bound on followed `Link: rel=next` pages per listing.
const MAX_PAGES: usize = 100;

/// Dashboard API client over any [`Invoker`].
///
/// Holds no per-organization state: base URL and credential come from the
/// [`OrganizationTarget`] of each call.
#[derive(Clone)]
pub struct DashboardApi {
    invoker: Arc<dyn Invoker>,
}

impl std::fmt::Debug for DashboardApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardApi").finish_non_exhaustive()
    }
}

impl DashboardApi {
    pub fn new(invoker: Arc<dyn Invoker>) -> Self {
        Self { invoker }
    }

    /// All devices of the organization, following pagination.
    pub async fn organization_devices(
        &self,
        target: &OrganizationTarget,
    ) -> Result<Vec<wire::Device>, ApiError> {
        let url = endpoint(
            target,
            &["organizations", &target.id, "devices"],
            &[("perPage", PAGE_SIZE.to_string())],
        )?;
        self.get_paginated(target, url).await
    }

    /// Uplink loss and latency samples over the last `timespan`.
    ///
    /// The dashboard expects whole seconds; the span is rounded up.
    pub async fn uplinks_loss_and_latency(
        &self,
        target: &OrganizationTarget,
        timespan: Duration,
    ) -> Result<Vec<wire::UplinkLossLatency>, ApiError> {
        let secs = timespan.as_secs() + u64::from(timespan.subsec_nanos() > 0);
        let url = endpoint(
            target,
            &["organizations", &target.id, "devices", "uplinksLossAndLatency"],
            &[("timespan", secs.to_string())],
        )?;
        self.get_list(target, url).await
    }

    /// Security appliance uplink statuses including HA state.
    pub async fn appliance_uplink_statuses(
        &self,
        target: &OrganizationTarget,
    ) -> Result<Vec<wire::ApplianceUplinkStatus>, ApiError> {
        let url = endpoint(
            target,
            &["organizations", &target.id, "appliance", "uplink", "statuses"],
            &[("perPage", PAGE_SIZE.to_string())],
        )?;
        self.get_paginated(target, url).await
    }

    /// Cellular gateway uplink statuses.
    pub async fn cellular_gateway_uplink_statuses(
        &self,
        target: &OrganizationTarget,
    ) -> Result<Vec<wire::CellularGatewayUplinkStatus>, ApiError> {
        let url = endpoint(
            target,
            &["organizations", &target.id, "cellularGateway", "uplink", "statuses"],
            &[("perPage", PAGE_SIZE.to_string())],
        )?;
        self.get_paginated(target, url).await
    }

    /// Online/offline status of every device.
    pub async fn device_statuses(
        &self,
        target: &OrganizationTarget,
    ) -> Result<Vec<wire::DeviceStatus>, ApiError> {
        let url = endpoint(
            target,
            &["organizations", &target.id, "devices", "statuses"],
            &[("perPage", PAGE_SIZE.to_string())],
        )?;
        self.get_paginated(target, url).await
    }

    /// Organization-wide device counts per status.
    pub async fn device_statuses_overview(
        &self,
        target: &OrganizationTarget,
    ) -> Result<wire::DeviceStatusOverview, ApiError> {
        let url = endpoint(
            target,
            &["organizations", &target.id, "devices", "statuses", "overview"],
            &[],
        )?;
        let response = self.invoker.invoke(&request(target, url)).await?;
        if response.is_empty() {
            return Ok(wire::DeviceStatusOverview::default());
        }
        response.json()
    }

    /// Performance score of one security appliance.
    ///
    /// Returns the HTTP status alongside the score; `204 No Content` yields `None`.
    pub async fn appliance_performance(
        &self,
        target: &OrganizationTarget,
        serial: &str,
    ) -> Result<(u16, Option<f64>), ApiError> {
        let url = endpoint(target, &["devices", serial, "appliance", "performance"], &[])?;
        let response = self.invoker.invoke(&request(target, url)).await?;
        if response.is_empty() {
            return Ok((response.status, None));
        }
        let body: wire::AppliancePerformance = response.json()?;
        Ok((response.status, body.perf_score))
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        target: &OrganizationTarget,
        url: String,
    ) -> Result<Vec<T>, ApiError> {
        let response = self.invoker.invoke(&request(target, url)).await?;
        if response.is_empty() {
            return Ok(Vec::new());
        }
        response.json()
    }

    async fn get_paginated<T: DeserializeOwned>(
        &self,
        target: &OrganizationTarget,
        mut url: String,
    ) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let response = self.invoker.invoke(&request(target, url.clone())).await?;
            if !response.is_empty() {
                items.extend(response.json::<Vec<T>>()?);
            }
            match response.next_page {
                Some(next) if next != url => url = next,
                _ => return Ok(items),
            }
            if page == MAX_PAGES {
                tracing::warn!(organization = %target.id, pages = MAX_PAGES, "Pagination limit reached");
            }
        }
        Ok(items)
    }
}

fn request(target: &OrganizationTarget, url: String) -> ApiRequest {
    ApiRequest::get(url)
        .with_bearer(&target.api_key)
        .with_header("Accept", "application/json")
}

/// Build `{base_url}/api/v1/{segments...}?{query}` with escaped segments.
fn endpoint(
    target: &OrganizationTarget,
    segments: &[&str],
    query: &[(&str, String)],
) -> Result<String, ApiError> {
    let invalid = |reason: String| ApiError::Transport {
        request: format!("GET {}", target.base_url),
        reason,
    };

    let mut url = Url::parse(&target.base_url).map_err(|e| invalid(format!("invalid base URL: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| invalid("base URL cannot carry a path".to_string()))?
        .pop_if_empty()
        .extend(["api", "v1"])
        .extend(segments);
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url.into())
}
