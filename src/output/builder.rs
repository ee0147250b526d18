//! Output builder and handles.

use std::io::Write;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::output::actor::{DEFAULT_BATCH_FLUSH_INTERVAL, DEFAULT_BATCH_SIZE, EventActor};
use crate::output::{EventWriter, OutputError};

/// Default channel capacity for writer commands.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Builder for the output layer.
pub struct OutputBuilder {
    out: Box<dyn Write + Send>,
    channel_capacity: usize,
    batch_size: usize,
    batch_flush_interval: Duration,
}

impl OutputBuilder {
    /// Write events to `out`.
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Box::new(out),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_flush_interval: DEFAULT_BATCH_FLUSH_INTERVAL,
        }
    }

    /// Write events to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Set the channel capacity for writer commands.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the number of buffered events that triggers a write. Default: 500.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the maximum time events stay buffered. Default: 1 second.
    pub fn batch_flush_interval(mut self, interval: Duration) -> Self {
        self.batch_flush_interval = interval;
        self
    }

    /// Spawn the writer actor and return handles.
    pub fn build(self) -> Result<OutputHandles, OutputError> {
        let (actor_handle, tx) = EventActor::spawn(
            self.out,
            self.channel_capacity,
            self.batch_size,
            self.batch_flush_interval,
        )?;
        Ok(OutputHandles {
            writer: EventWriter::new(tx),
            actor_handle: Some(actor_handle),
        })
    }
}

/// Handles to the output layer.
pub struct OutputHandles {
    /// Event writer facade.
    pub writer: EventWriter,
    /// Internal actor handle for graceful shutdown.
    actor_handle: Option<JoinHandle<()>>,
}

impl OutputHandles {
    /// Flush pending events and stop the writer actor.
    pub fn shutdown(mut self) -> Result<(), OutputError> {
        self.writer.shutdown()?;

        if let Some(handle) = self.actor_handle.take() {
            handle
                .join()
                .map_err(|_| OutputError::Internal("Failed to join writer thread".to_string()))?;
        }

        let dropped = self.writer.dropped_events();
        if dropped > 0 {
            tracing::warn!(dropped, "Events dropped during run");
        }
        Ok(())
    }
}

impl Drop for OutputHandles {
    fn drop(&mut self) {
        // Try graceful shutdown if not already done
        if self.actor_handle.is_some() {
            let _ = self.writer.shutdown();
            if let Some(handle) = self.actor_handle.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::EventSink;
    use crate::output::actor::tests::{SharedBuf, event};

    #[test]
    fn test_builder_roundtrip() {
        let buf = SharedBuf::default();
        let handles = OutputBuilder::new(buf.clone()).build().unwrap();

        for serial in ["S1", "S2", "S3"] {
            handles.writer.emit(event(serial)).unwrap();
        }
        handles.shutdown().unwrap();

        let serials: Vec<_> = buf
            .lines()
            .iter()
            .map(|l| l["device.serial"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(serials, ["S1", "S2", "S3"]);
    }

    #[test]
    fn test_drop_flushes() {
        let buf = SharedBuf::default();
        {
            let handles = OutputBuilder::new(buf.clone()).batch_size(100).build().unwrap();
            handles.writer.emit(event("S1")).unwrap();
        }
        assert_eq!(buf.lines().len(), 1);
    }
}
