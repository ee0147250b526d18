//! Dashbeat - Dashboard Telemetry Collector
//!
//! Periodically collects device telemetry from a rate-limited vendor dashboard
//! API. Each cycle resolves the device inventory of every organization, fetches
//! the enabled metric streams, joins every sample to its device and emits one
//! structured event per sample.
//!
//! # Architecture
//!
//! - **API**: Retrying invoker and typed dashboard endpoints
//! - **Inventory**: Device listing keyed by serial
//! - **Metrics**: One metricset per vendor stream, window-bounded time-series
//! - **Correlation**: Device dimensions joined with metric fields
//! - **Collector**: Cycle orchestration and scheduling
//! - **Output**: Non-blocking NDJSON event writer

pub mod api;
pub mod collector;
pub mod config;
pub mod correlate;
pub mod inventory;
pub mod metrics;
pub mod output;

pub use api::{
    ApiError, ApiRequest, ApiResponse, DashboardApi, Invoker, ReqwestTransport, RetryPolicy,
    RetryingInvoker, Transport,
};
pub use collector::{
    CollectionJob, CollectorError, CollectorRegistry, CycleReport, MetricSet, Orchestrator,
    OrganizationTarget, Schedule,
};
pub use correlate::{Event, correlate};
pub use inventory::{DashboardInventory, Device, DeviceKey, Inventory, InventoryResolver};
pub use metrics::{FetchWindow, MetricKind, MetricSample, UnmatchedPolicy, WindowCursor};
pub use output::{EventSink, EventWriter, OutputBuilder, OutputError, OutputHandles};
