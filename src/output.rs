//! Output Layer
//!
//! Events leave the engine through a non-blocking writer:
//! - **Writer**: [`EventWriter`] enqueues with `try_send`; a full queue drops the event
//! - **Actor**: dedicated thread that batches events and writes them as NDJSON
//!
//! # Components
//!
//! - [`EventSink`]: Emission seam used by the orchestrator
//! - [`EventWriter`]: Channel-backed sink
//! - [`OutputBuilder`] / [`OutputHandles`]: Initialization and lifecycle management

mod actor;
mod builder;
mod error;
mod writer;

pub use builder::{OutputBuilder, OutputHandles};
pub use error::OutputError;
pub use writer::{EventSink, EventWriter};
