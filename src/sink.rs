//! Terminal consumers of rendered records.
//!
//! A sink never surfaces delivery failures to the code that logged the
//! record. Failures flip the sink into a degraded state and are reported
//! through the `log` facade at a throttled rate by [`SinkHealth`].

use std::{
    io,
    sync::atomic::{AtomicBool, Ordering},
};

use log::warn;
use thiserror::Error;

use crate::{
    formatter::Rendered,
    rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner},
};

/// Why a single record did not reach its sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink queue is full")]
    QueueFull,
    #[error("sink is closed")]
    Closed,
    #[error("sink I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Construction-time sink misconfiguration.
#[derive(Debug, Error)]
pub enum SinkBuildError {
    #[error("invalid sink configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to open sink resources: {0}")]
    Io(#[from] io::Error),
}

/// Trait implemented by every sink.
///
/// `write` must return promptly: sinks backed by slow resources hand the
/// record to their own worker thread.
pub trait ScribeSink: Send + Sync {
    fn name(&self) -> &str;

    fn write(&self, rendered: Rendered) -> Result<(), SinkError>;

    /// Wait (bounded) until queued records have been written.
    fn flush(&self) -> bool {
        true
    }

    /// Release every resource the sink holds. Calling it again is a no-op.
    fn close(&self);

    fn is_closed(&self) -> bool;

    fn is_degraded(&self) -> bool {
        false
    }
}

/// Degraded flag plus rate-limited warnings for one sink.
pub struct SinkHealth {
    name: String,
    degraded: AtomicBool,
    queue_full: RateLimitedWarner,
    closed: RateLimitedWarner,
    failed: RateLimitedWarner,
}

impl SinkHealth {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            degraded: AtomicBool::new(false),
            queue_full: RateLimitedWarner::new(DEFAULT_WARN_INTERVAL),
            closed: RateLimitedWarner::new(DEFAULT_WARN_INTERVAL),
            failed: RateLimitedWarner::new(DEFAULT_WARN_INTERVAL),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Count a record that never made it into the sink's queue.
    pub fn report_dropped(&self, err: &SinkError) {
        let name = &self.name;
        match err {
            SinkError::QueueFull => {
                self.queue_full.record_drop();
                self.queue_full.warn_if_due(|count| {
                    warn!("{name}: {count} log records dropped because the queue was full");
                });
            }
            SinkError::Closed => {
                self.closed.record_drop();
                self.closed.warn_if_due(|count| {
                    warn!("{name}: {count} log records dropped after the sink was closed");
                });
            }
            SinkError::Io(io_err) => self.report_failure(io_err),
        }
    }

    /// Mark the sink degraded after its underlying resource failed.
    pub fn report_failure(&self, err: &io::Error) {
        let name = &self.name;
        if !self.degraded.swap(true, Ordering::AcqRel) {
            warn!("{name}: sink degraded: {err}");
        }
        self.failed.record_drop();
        self.failed.warn_if_due(|count| {
            warn!("{name}: {count} log records failed to write (last error: {err})");
        });
    }

    /// Clear the degraded flag after a successful write.
    pub fn report_recovered(&self) {
        if self.degraded.load(Ordering::Relaxed) && self.degraded.swap(false, Ordering::AcqRel) {
            log::debug!("{}: sink recovered", self.name);
        }
    }

    /// Emit any pending drop summaries immediately.
    pub fn flush_warnings(&self) {
        let name = &self.name;
        self.queue_full.flush(|count| {
            warn!("{name}: {count} log records dropped because the queue was full");
        });
        self.closed.flush(|count| {
            warn!("{name}: {count} log records dropped after the sink was closed");
        });
        self.failed.flush(|count| {
            warn!("{name}: {count} log records failed to write");
        });
    }
}
