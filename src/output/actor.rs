//! Writer actor with a dedicated thread and MPSC channel.
//!
//! Single-writer pattern: one thread owns the destination and processes
//! commands in order. Events are buffered and written as one JSON object per
//! line when the buffer reaches the batch size or the flush interval elapses.

use std::io::{BufWriter, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::correlate::Event;
use crate::output::OutputError;

/// Default maximum events in buffer before flush.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default maximum time before buffer flush.
pub const DEFAULT_BATCH_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Idle wait when nothing is buffered.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Commands sent to the writer actor.
#[derive(Debug)]
pub enum Command {
    /// Buffer an event.
    Emit(Box<Event>),
    /// Force flush the buffer.
    Flush,
    /// Flush and stop.
    Shutdown,
}

/// Buffer with time-based and size-based flushing.
struct BatchBuffer<T> {
    items: Vec<T>,
    last_flush: Instant,
    max_items: usize,
    max_age: Duration,
}

impl<T> BatchBuffer<T> {
    fn new(max_items: usize, max_age: Duration) -> Self {
        let max_items = max_items.max(1);
        Self {
            items: Vec::with_capacity(max_items),
            last_flush: Instant::now(),
            max_items,
            max_age,
        }
    }

    fn push(&mut self, item: T) {
        // Reset flush timer on first item to avoid treating long-idle buffers as overdue
        if self.items.is_empty() {
            self.last_flush = Instant::now();
        }
        self.items.push(item);
    }

    fn should_flush(&self) -> bool {
        self.items.len() >= self.max_items
            || (!self.items.is_empty() && self.last_flush.elapsed() >= self.max_age)
    }

    fn deadline(&self) -> Option<Instant> {
        (!self.items.is_empty()).then(|| self.last_flush + self.max_age)
    }

    fn take(&mut self) -> Vec<T> {
        self.last_flush = Instant::now();
        std::mem::take(&mut self.items)
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// NDJSON writer actor.
pub struct EventActor {
    out: BufWriter<Box<dyn Write + Send>>,
    rx: Receiver<Command>,
    buffer: BatchBuffer<Event>,
}

impl EventActor {
    /// Spawn the writer actor thread.
    pub fn spawn(
        out: Box<dyn Write + Send>,
        channel_capacity: usize,
        batch_size: usize,
        batch_flush_interval: Duration,
    ) -> Result<(JoinHandle<()>, SyncSender<Command>), OutputError> {
        let (tx, rx) = mpsc::sync_channel(channel_capacity);
        let mut actor = EventActor {
            out: BufWriter::new(out),
            rx,
            buffer: BatchBuffer::new(batch_size, batch_flush_interval),
        };
        let handle = thread::Builder::new()
            .name("event-writer".to_string())
            .spawn(move || actor.run())?;
        Ok((handle, tx))
    }

    fn run(&mut self) {
        tracing::info!("EventActor started");

        loop {
            let now = Instant::now();
            let timeout = self
                .buffer
                .deadline()
                .map_or(IDLE_TIMEOUT, |d| d.saturating_duration_since(now));

            match self.rx.recv_timeout(timeout) {
                Ok(cmd) => {
                    if self.handle_command(cmd) {
                        break; // Shutdown requested
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("Channel disconnected, shutting down");
                    self.flush_all();
                    break;
                }
            }

            if self.buffer.should_flush() {
                self.flush_all();
            }
        }

        tracing::info!("EventActor stopped");
    }

    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Emit(event) => self.buffer.push(*event),
            Command::Flush => self.flush_all(),
            Command::Shutdown => {
                tracing::info!("EventActor shutting down");
                self.flush_all();
                return true;
            }
        }
        false
    }

    fn flush_all(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let events = self.buffer.take();
        if let Err(e) = self.write_batch(&events) {
            tracing::error!(error = %e, count = events.len(), "Event batch write failed");
        }
    }

    fn write_batch(&mut self, events: &[Event]) -> Result<(), OutputError> {
        for event in events {
            serde_json::to_writer(&mut self.out, event)?;
            self.out.write_all(b"\n")?;
        }
        self.out.flush()?;
        tracing::debug!(count = events.len(), "Event batch written");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metrics::{Fields, MetricKind};
    use chrono::{TimeZone, Utc};
    use std::sync::{Arc, Mutex};

    /// In-memory destination shared with the test.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub(crate) fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn event(serial: &str) -> Event {
        let mut fields = Fields::new();
        fields.insert("device.serial".into(), serial.into());
        Event {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            organization_id: "org1".into(),
            metricset: MetricKind::DeviceStatus,
            fields,
        }
    }

    #[test]
    fn test_actor_lifecycle() {
        let (handle, tx) = EventActor::spawn(
            Box::new(SharedBuf::default()),
            10,
            DEFAULT_BATCH_SIZE,
            DEFAULT_BATCH_FLUSH_INTERVAL,
        )
        .unwrap();
        tx.send(Command::Shutdown).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_shutdown_flushes_buffer_as_ndjson() {
        let buf = SharedBuf::default();
        let (handle, tx) = EventActor::spawn(
            Box::new(buf.clone()),
            10,
            DEFAULT_BATCH_SIZE,
            Duration::from_secs(3600),
        )
        .unwrap();

        tx.send(Command::Emit(Box::new(event("S1")))).unwrap();
        tx.send(Command::Emit(Box::new(event("S2")))).unwrap();
        tx.send(Command::Shutdown).unwrap();
        handle.join().unwrap();

        let lines = buf.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["device.serial"], "S1");
        assert_eq!(lines[1]["@timestamp"], "2024-03-01T10:00:00Z");
        assert_eq!(lines[1]["organization_id"], "org1");
    }

    #[test]
    fn test_batch_size_triggers_flush() {
        let buf = SharedBuf::default();
        let (handle, tx) =
            EventActor::spawn(Box::new(buf.clone()), 10, 2, Duration::from_secs(3600)).unwrap();

        tx.send(Command::Emit(Box::new(event("S1")))).unwrap();
        tx.send(Command::Emit(Box::new(event("S2")))).unwrap();
        tx.send(Command::Emit(Box::new(event("S3")))).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while buf.lines().len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(buf.lines().len(), 2);

        tx.send(Command::Shutdown).unwrap();
        handle.join().unwrap();
        assert_eq!(buf.lines().len(), 3);
    }

    #[test]
    fn test_disconnect_flushes() {
        let buf = SharedBuf::default();
        let (handle, tx) = EventActor::spawn(
            Box::new(buf.clone()),
            10,
            DEFAULT_BATCH_SIZE,
            Duration::from_secs(3600),
        )
        .unwrap();
        tx.send(Command::Emit(Box::new(event("S1")))).unwrap();
        drop(tx);
        handle.join().unwrap();
        assert_eq!(buf.lines().len(), 1);
    }
}
