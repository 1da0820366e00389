//! Background worker thread shared by the I/O-backed sinks.
//!
//! The worker receives [`SinkCommand`] values over a bounded channel, writes
//! rendered records through a [`RecordWriter`], and acknowledges flush
//! requests. Producers only ever `try_send`, so a slow writer can never delay
//! the caller or any other sink.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::warn;
use parking_lot::{Mutex, RwLock};

use crate::{
    formatter::Rendered,
    sink::{SinkError, SinkHealth},
};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Writes rendered records to the underlying resource.
pub(crate) trait RecordWriter: Send + 'static {
    fn write_rendered(&mut self, rendered: &Rendered) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Commands sent to the worker thread.
pub(crate) enum SinkCommand {
    Record(Rendered),
    Flush(Sender<()>),
}

pub(crate) struct SinkWorker {
    tx: RwLock<Option<Sender<SinkCommand>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    done_rx: Receiver<()>,
    health: Arc<SinkHealth>,
    closed: AtomicBool,
}

impl SinkWorker {
    pub(crate) fn spawn<W: RecordWriter>(
        writer: W,
        capacity: usize,
        health: Arc<SinkHealth>,
    ) -> io::Result<Self> {
        let (tx, rx) = bounded(capacity);
        let (done_tx, done_rx) = bounded(1);
        let worker_health = Arc::clone(&health);
        let handle = thread::Builder::new()
            .name(format!("scribelog-{}", health.name()))
            .spawn(move || run(writer, rx, &worker_health, done_tx))?;
        Ok(Self {
            tx: RwLock::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            done_rx,
            health,
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn health(&self) -> &SinkHealth {
        &self.health
    }

    /// Queue a record without blocking.
    pub(crate) fn submit(&self, rendered: Rendered) -> Result<(), SinkError> {
        let guard = self.tx.read();
        let result = match guard.as_ref() {
            None => Err(SinkError::Closed),
            Some(tx) => tx
                .try_send(SinkCommand::Record(rendered))
                .map_err(|err| match err {
                    TrySendError::Full(_) => SinkError::QueueFull,
                    TrySendError::Disconnected(_) => SinkError::Closed,
                }),
        };
        drop(guard);
        if let Err(err) = &result {
            self.health.report_dropped(err);
        }
        result
    }

    /// Ask the worker to flush and wait for its acknowledgement.
    pub(crate) fn flush(&self) -> bool {
        let (ack_tx, ack_rx) = bounded(1);
        {
            let guard = self.tx.read();
            let Some(tx) = guard.as_ref() else {
                return false;
            };
            if tx
                .send_timeout(SinkCommand::Flush(ack_tx), FLUSH_TIMEOUT)
                .is_err()
            {
                return false;
            }
        }
        ack_rx.recv_timeout(FLUSH_TIMEOUT).is_ok()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drain the queue, stop the worker and join it. Idempotent.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.tx.write().take();
        let name = self.health.name();
        if let Some(handle) = self.handle.lock().take() {
            if self.done_rx.recv_timeout(CLOSE_TIMEOUT).is_err() {
                warn!("{name}: worker thread did not shut down within {CLOSE_TIMEOUT:?}");
                return;
            }
            if handle.join().is_err() {
                warn!("{name}: worker thread panicked");
            }
        }
        self.health.flush_warnings();
    }
}

impl Drop for SinkWorker {
    fn drop(&mut self) {
        self.close();
    }
}

fn run<W: RecordWriter>(
    mut writer: W,
    rx: Receiver<SinkCommand>,
    health: &SinkHealth,
    done_tx: Sender<()>,
) {
    for cmd in rx {
        match cmd {
            SinkCommand::Record(rendered) => match writer.write_rendered(&rendered) {
                Ok(()) => health.report_recovered(),
                Err(err) => health.report_failure(&err),
            },
            SinkCommand::Flush(ack) => {
                if let Err(err) = writer.flush() {
                    health.report_failure(&err);
                }
                let _ = ack.send(());
            }
        }
    }
    if let Err(err) = writer.flush() {
        health.report_failure(&err);
    }
    let _ = done_tx.send(());
}
