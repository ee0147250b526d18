//! Collector Layer
//!
//! Collection cycles fetch the inventory and the enabled metricsets of every
//! organization, correlate the samples with the devices and hand the events
//! to an [`EventSink`](crate::output::EventSink).
//!
//! # Architecture
//!
//! - [`MetricSet`]: Core trait for one dynamic metric stream
//! - [`Orchestrator`]: Runs one cycle across organizations with failure isolation
//! - [`Schedule`]: Execution schedule (interval or cron)
//! - [`CollectorRegistry`]: Schedules cycles and handles graceful shutdown
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use dashbeat::{
//!     DashboardApi, DashboardInventory, MetricKind, Orchestrator, OrganizationTarget,
//!     OutputBuilder, ReqwestTransport, RetryPolicy, RetryingInvoker,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let output = OutputBuilder::stdout().build()?;
//! let invoker = RetryingInvoker::new(ReqwestTransport::new(Duration::from_secs(30))?, RetryPolicy::default());
//! let api = DashboardApi::new(Arc::new(invoker));
//! let orchestrator = Orchestrator::new(
//!     Arc::new(DashboardInventory::new(api.clone())),
//!     MetricKind::ALL.iter().map(|k| dashbeat::metrics::build(*k, api.clone(), 4)).collect(),
//!     Arc::new(output.writer.clone()),
//! );
//! let target = OrganizationTarget::new("123456", "https://api.meraki.com", "key", Duration::from_secs(60));
//! let report = orchestrator.run_cycle(&[target]).await;
//! println!("{} events", report.events());
//! output.shutdown()?;
//! # Ok(())
//! # }
//! ```

mod orchestrator;
mod registry;
mod traits;

pub use orchestrator::{CycleReport, Orchestrator, OrganizationReport};
pub use registry::{CollectionJob, CollectorRegistry, DEFAULT_SHUTDOWN_TIMEOUT, JobInfo};
pub use traits::{
    CRON_PERIOD_HORIZON, CollectorError, FetchScope, MIN_INTERVAL, MetricSet, OrganizationTarget,
    Schedule,
};
