//! Emission facade.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};

use crate::correlate::Event;
use crate::output::OutputError;
use crate::output::actor::Command;

/// Where correlated events go.
///
/// Emission must not block: implementations either accept the event
/// immediately or refuse it.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: Event) -> Result<(), OutputError>;
}

/// Non-blocking event writer.
///
/// Uses `try_send` - events are dropped if the channel is full.
/// Events are buffered and flushed when the buffer reaches the batch size or
/// the flush interval elapses.
#[derive(Clone)]
pub struct EventWriter {
    tx: SyncSender<Command>,
    dropped_events: Arc<AtomicU64>,
}

impl std::fmt::Debug for EventWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventWriter")
            .field("dropped_events", &self.dropped_events())
            .finish_non_exhaustive()
    }
}

impl EventWriter {
    pub(crate) fn new(tx: SyncSender<Command>) -> Self {
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total events dropped because the channel was full or closed.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Force flush buffered events.
    pub fn flush(&self) -> Result<(), OutputError> {
        self.tx.try_send(Command::Flush).map_err(map_send_error)
    }

    pub(crate) fn shutdown(&self) -> Result<(), OutputError> {
        // Shutdown must get through even when the queue is full.
        self.tx.send(Command::Shutdown).map_err(|_| OutputError::Closed)
    }
}

impl EventSink for EventWriter {
    fn emit(&self, event: Event) -> Result<(), OutputError> {
        self.tx
            .try_send(Command::Emit(Box::new(event)))
            .map_err(|e| {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                let err = map_send_error(e);
                tracing::warn!(error = %err, "Dropping event");
                err
            })
    }
}

fn map_send_error<T>(err: TrySendError<T>) -> OutputError {
    match err {
        TrySendError::Full(_) => OutputError::ChannelFull,
        TrySendError::Disconnected(_) => OutputError::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::actor::tests::event;
    use std::sync::mpsc;

    #[test]
    fn test_full_channel_drops_and_counts() {
        // Nobody drains the receiver.
        let (tx, _rx) = mpsc::sync_channel(1);
        let writer = EventWriter::new(tx);
        let shared = writer.clone();

        writer.emit(event("S1")).unwrap();
        let err = writer.emit(event("S2")).unwrap_err();

        assert!(matches!(err, OutputError::ChannelFull));
        assert_eq!(writer.dropped_events(), 1);
        assert_eq!(shared.dropped_events(), 1);
    }

    #[test]
    fn test_closed_channel() {
        let (tx, rx) = mpsc::sync_channel(1);
        drop(rx);
        let writer = EventWriter::new(tx);

        assert!(matches!(writer.emit(event("S1")), Err(OutputError::Closed)));
        assert!(matches!(writer.flush(), Err(OutputError::Closed)));
        assert_eq!(writer.dropped_events(), 1);
    }
}
