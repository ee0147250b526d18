//! Vendor dashboard API access.
//!
//! - [`ApiRequest`] / [`ApiResponse`]: one HTTP call and its decoded result
//! - [`RetryingInvoker`]: rate-limit aware retry/backoff over a [`Transport`]
//! - [`DashboardApi`]: typed endpoints used by the inventory and metricsets

mod client;
mod error;
mod invoker;
mod request;
pub mod wire;

pub use client::DashboardApi;
pub use error::ApiError;
pub use invoker::{
    DEFAULT_MAX_ATTEMPTS, Invoker, RawResponse, ReqwestTransport, RetryPolicy, RetryingInvoker,
    Transport, TransportError,
};
pub use request::{ApiRequest, ApiResponse};
