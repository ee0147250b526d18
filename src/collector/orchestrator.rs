//! One collection cycle across organizations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::collector::{CollectorError, FetchScope, MetricSet, OrganizationTarget};
use crate::correlate::correlate;
use crate::inventory::InventoryResolver;
use crate::metrics::{MetricKind, WindowCursor};
use crate::output::EventSink;

/// Outcome of one organization in a cycle.
#[derive(Debug)]
pub struct OrganizationReport {
    pub organization_id: String,
    /// Events handed to the sink, or the reason the organization failed as a whole.
    pub outcome: Result<usize, CollectorError>,
    /// Metricsets that failed while the rest of the organization went through.
    pub failed_metricsets: Vec<(MetricKind, CollectorError)>,
    /// Events the sink refused.
    pub rejected: usize,
}

impl OrganizationReport {
    fn failed(organization_id: &str, err: CollectorError) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            outcome: Err(err),
            failed_metricsets: Vec::new(),
            rejected: 0,
        }
    }

    /// Inventory resolved and every metricset succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok() && self.failed_metricsets.is_empty()
    }
}

/// Result of [`Orchestrator::run_cycle`], one report per target in input order.
#[derive(Debug)]
pub struct CycleReport {
    pub collected_at: DateTime<Utc>,
    pub duration: Duration,
    pub organizations: Vec<OrganizationReport>,
}

impl CycleReport {
    /// Total events emitted.
    pub fn events(&self) -> usize {
        self.organizations
            .iter()
            .filter_map(|o| o.outcome.as_ref().ok())
            .sum()
    }

    /// Organizations with any failure.
    pub fn failures(&self) -> impl Iterator<Item = &OrganizationReport> {
        self.organizations.iter().filter(|o| !o.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Runs collection cycles: inventory, metricsets, correlation, emission.
///
/// Organizations are independent: a failure in one never stops the others.
/// Within an organization, the metricsets are independent as well; only an
/// inventory failure fails the organization as a whole.
pub struct Orchestrator {
    inventory: Arc<dyn InventoryResolver>,
    metricsets: Vec<Arc<dyn MetricSet>>,
    sink: Arc<dyn EventSink>,
    cursor: Arc<WindowCursor>,
    max_concurrent_organizations: Option<usize>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<MetricKind> = self.metricsets.iter().map(|m| m.kind()).collect();
        f.debug_struct("Orchestrator")
            .field("metricsets", &kinds)
            .field(
                "max_concurrent_organizations",
                &self.max_concurrent_organizations,
            )
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        inventory: Arc<dyn InventoryResolver>,
        metricsets: Vec<Arc<dyn MetricSet>>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inventory,
            metricsets,
            sink,
            cursor: Arc::new(WindowCursor::new()),
            max_concurrent_organizations: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Bound the number of organizations processed at once (minimum 1).
    pub fn with_max_concurrent_organizations(mut self, limit: usize) -> Self {
        self.max_concurrent_organizations = Some(limit.max(1));
        self
    }

    /// Abort in-flight organizations when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run one cycle for `targets`, collecting at the current instant.
    pub async fn run_cycle(&self, targets: &[OrganizationTarget]) -> CycleReport {
        self.run_cycle_at(targets, Utc::now()).await
    }

    /// Run one cycle as if collecting at `collected_at`.
    pub async fn run_cycle_at(
        &self,
        targets: &[OrganizationTarget],
        collected_at: DateTime<Utc>,
    ) -> CycleReport {
        let started = Instant::now();
        let limit = self
            .max_concurrent_organizations
            .unwrap_or(targets.len())
            .max(1);

        // Owned targets keep the cycle future `Send` for the scheduler.
        let organizations: Vec<OrganizationReport> = stream::iter(targets.to_vec())
            .map(|target| async move {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        OrganizationReport::failed(&target.id, CollectorError::Cancelled)
                    }
                    report = self.run_organization(&target, collected_at) => report,
                }
            })
            .buffered(limit)
            .collect()
            .await;

        let report = CycleReport {
            collected_at,
            duration: started.elapsed(),
            organizations,
        };
        tracing::info!(
            organizations = report.organizations.len(),
            failed = report.failures().count(),
            events = report.events(),
            duration_ms = report.duration.as_millis(),
            "Collection cycle finished"
        );
        report
    }

    async fn run_organization(
        &self,
        target: &OrganizationTarget,
        collected_at: DateTime<Utc>,
    ) -> OrganizationReport {
        let inventory = match self.inventory.resolve(target).await {
            Ok(inventory) => inventory,
            Err(e) => {
                tracing::error!(organization = %target.id, error = %e, "Inventory resolution failed");
                return OrganizationReport::failed(&target.id, e);
            }
        };

        let fetches = self.metricsets.iter().map(|metricset| {
            let scope = FetchScope {
                target,
                inventory: &inventory,
                window: self
                    .cursor
                    .window(&target.id, metricset.kind(), collected_at, target.period),
                collected_at,
            };
            async move {
                let result = metricset.fetch(&scope).await;
                (metricset, scope.window, result)
            }
        });
        let results = future::join_all(fetches).await;

        let mut report = OrganizationReport {
            organization_id: target.id.clone(),
            outcome: Ok(0),
            failed_metricsets: Vec::new(),
            rejected: 0,
        };
        let mut emitted = 0usize;

        for (metricset, window, result) in results {
            let kind = metricset.kind();
            let samples = match result {
                Ok(samples) => samples,
                Err(e) if e.is_cancelled() => {
                    tracing::debug!(organization = %target.id, metricset = %kind, "Metricset fetch cancelled");
                    report.failed_metricsets.push((kind, CollectorError::Cancelled));
                    continue;
                }
                Err(e) => {
                    tracing::error!(organization = %target.id, metricset = %kind, error = %e, "Metricset fetch failed");
                    report.failed_metricsets.push((kind, e));
                    continue;
                }
            };

            let events = correlate(
                kind,
                metricset.unmatched_policy(),
                &target.id,
                &inventory,
                &samples,
                collected_at,
            );
            tracing::debug!(
                organization = %target.id,
                metricset = %kind,
                samples = samples.len(),
                events = events.len(),
                "Metricset correlated"
            );
            for event in events {
                match self.sink.emit(event) {
                    Ok(()) => emitted += 1,
                    Err(_) => report.rejected += 1,
                }
            }
            self.cursor.commit(&target.id, kind, &window);
        }

        report.outcome = Ok(emitted);
        report
    }
}
