//! Collector registry for scheduling collection cycles.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::collector::{CollectorError, Orchestrator, OrganizationTarget, Schedule};

/// Time given to the scheduler to stop before shutdown gives up.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A scheduled collection: which organizations, how often.
#[derive(Debug, Clone)]
pub struct CollectionJob {
    pub name: String,
    pub schedule: Schedule,
    pub targets: Vec<OrganizationTarget>,
}

/// Registered job as reported by [`CollectorRegistry::list_jobs`].
#[derive(Debug, Clone)]
pub struct JobInfo {
    /// Job UUID.
    pub id: uuid::Uuid,
    /// Job name.
    pub name: String,
    /// Schedule description.
    pub schedule: String,
    /// Number of organizations per cycle.
    pub organizations: usize,
}

/// Runs collection jobs on their schedules.
///
/// Each tick runs one [`Orchestrator`] cycle over the job's targets. A tick
/// that fires while the previous cycle of the same job is still running is
/// skipped.
pub struct CollectorRegistry {
    scheduler: JobScheduler,
    jobs: Arc<RwLock<HashMap<uuid::Uuid, JobInfo>>>,
    cancel: CancellationToken,
}

impl CollectorRegistry {
    /// Create a new registry. Cancelling `cancel` aborts in-flight cycles.
    pub async fn new(cancel: CancellationToken) -> Result<Self, CollectorError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))?;

        Ok(Self {
            scheduler,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            cancel,
        })
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("jobs", &self.jobs.try_read().ok().map(|j| j.len()))
            .finish_non_exhaustive()
    }
}

impl CollectorRegistry {
    /// Register a job that runs `orchestrator` on its schedule.
    pub async fn spawn(
        &self,
        job: CollectionJob,
        orchestrator: Arc<Orchestrator>,
    ) -> Result<uuid::Uuid, CollectorError> {
        let schedule_desc = job.schedule.to_string();
        let info = JobInfo {
            id: uuid::Uuid::nil(),
            name: job.name.clone(),
            schedule: schedule_desc.clone(),
            organizations: job.targets.len(),
        };

        let scheduled = self.create_job(job, orchestrator).inspect_err(|e| {
            tracing::error!(job = %info.name, schedule = %schedule_desc, error = %e, "Job create failed");
        })?;

        let job_id = self
            .scheduler
            .add(scheduled)
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))
            .inspect_err(|e| {
                tracing::error!(job = %info.name, schedule = %schedule_desc, error = %e, "Job register failed");
            })?;

        tracing::info!(job = %info.name, job_id = %job_id, schedule = %schedule_desc, "Collection job registered");
        self.jobs
            .write()
            .await
            .insert(job_id, JobInfo { id: job_id, ..info });
        Ok(job_id)
    }

    /// Start firing ticks.
    pub async fn start(&self) -> Result<(), CollectorError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))?;
        tracing::info!("Collector scheduler started");
        Ok(())
    }

    /// Snapshot of registered jobs, in no particular order.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        self.jobs.read().await.values().cloned().collect()
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Unschedule a job. A cycle already running is not interrupted.
    pub async fn remove(&self, job_id: &uuid::Uuid) -> Result<(), CollectorError> {
        self.scheduler
            .remove(job_id)
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))?;
        let removed = self.jobs.write().await.remove(job_id);
        tracing::info!(job_id = %job_id, job = ?removed.map(|j| j.name), "Collection job removed");
        Ok(())
    }

    /// [`shutdown_with_timeout`](Self::shutdown_with_timeout) with [`DEFAULT_SHUTDOWN_TIMEOUT`].
    pub async fn shutdown(self) -> Result<(), CollectorError> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Cancel in-flight cycles, then stop the scheduler within `timeout`.
    pub async fn shutdown_with_timeout(mut self, timeout: Duration) -> Result<(), CollectorError> {
        self.cancel.cancel();
        let job_count = self.jobs.read().await.len();

        let result = tokio::time::timeout(timeout, async {
            self.scheduler
                .shutdown()
                .await
                .map_err(|e| CollectorError::Scheduler(e.to_string()))
        })
        .await;

        match result {
            Ok(Ok(())) => {
                tracing::info!(job_count, "Collector scheduler shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(job_count, error = %e, "Collector scheduler shutdown failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(job_count, "Collector scheduler shutdown timed out");
                Ok(())
            }
        }
    }

    fn create_job(
        &self,
        job: CollectionJob,
        orchestrator: Arc<Orchestrator>,
    ) -> Result<Job, CollectorError> {
        let schedule = job.schedule.clone();
        let job = Arc::new(job);
        // Held for the duration of a cycle; a tick that finds it taken is skipped.
        let running = Arc::new(Mutex::new(()));

        let make_callback = move || {
            move |_: uuid::Uuid, _: JobScheduler| {
                let (job, orchestrator, running) =
                    (Arc::clone(&job), Arc::clone(&orchestrator), Arc::clone(&running));
                Box::pin(async move { run_collection(&job, &orchestrator, &running).await })
                    as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
            }
        };

        match &schedule {
            Schedule::Interval(d) => Job::new_repeated_async(*d, make_callback()),
            Schedule::Cron(expr) => Job::new_cron_job_async(expr, make_callback()),
        }
        .map_err(|e| CollectorError::Scheduler(e.to_string()))
    }
}

/// Execute one cycle unless the previous one is still running.
async fn run_collection(job: &CollectionJob, orchestrator: &Orchestrator, running: &Mutex<()>) {
    let Ok(_guard) = running.try_lock() else {
        tracing::warn!(job = %job.name, "Previous cycle still running; skipping tick");
        return;
    };

    tracing::debug!(job = %job.name, organizations = job.targets.len(), "Running collection cycle");
    let report = orchestrator.run_cycle(&job.targets).await;

    for org in report.failures() {
        match &org.outcome {
            Err(e) => tracing::warn!(
                job = %job.name,
                organization = %org.organization_id,
                error = %e,
                "Organization failed"
            ),
            Ok(_) => tracing::warn!(
                job = %job.name,
                organization = %org.organization_id,
                failed_metricsets = org.failed_metricsets.len(),
                "Organization partially collected"
            ),
        }
    }
}
