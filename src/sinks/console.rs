//! Line-oriented sink for stdout or any other `io::Write`.

use std::{
    io::{self, Write},
    sync::Arc,
};

use super::worker::{DEFAULT_CHANNEL_CAPACITY, RecordWriter, SinkWorker};
use crate::{
    formatter::Rendered,
    sink::{ScribeSink, SinkBuildError, SinkError, SinkHealth},
};

struct LineWriter<W> {
    inner: W,
}

impl<W: Write + Send + 'static> RecordWriter for LineWriter<W> {
    fn write_rendered(&mut self, rendered: &Rendered) -> io::Result<()> {
        writeln!(self.inner, "{rendered}")?;
        self.inner.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes one line per rendered record from a dedicated worker thread.
pub struct ConsoleSink {
    name: String,
    worker: SinkWorker,
}

impl ConsoleSink {
    /// Sink writing to `stdout`.
    pub fn stdout() -> Result<Self, SinkBuildError> {
        Self::new(io::stdout(), "console")
    }

    /// Sink writing to `stderr`.
    pub fn stderr() -> Result<Self, SinkBuildError> {
        Self::new(io::stderr(), "console:stderr")
    }

    pub fn new<W>(writer: W, name: impl Into<String>) -> Result<Self, SinkBuildError>
    where
        W: Write + Send + 'static,
    {
        Self::with_capacity(writer, name, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity<W>(
        writer: W,
        name: impl Into<String>,
        capacity: usize,
    ) -> Result<Self, SinkBuildError>
    where
        W: Write + Send + 'static,
    {
        if capacity == 0 {
            return Err(SinkBuildError::InvalidConfig(
                "capacity must be greater than zero".into(),
            ));
        }
        let name = name.into();
        let health = Arc::new(SinkHealth::new(name.clone()));
        let worker = SinkWorker::spawn(LineWriter { inner: writer }, capacity, health)?;
        Ok(Self { name, worker })
    }
}

impl ScribeSink for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, rendered: Rendered) -> Result<(), SinkError> {
        self.worker.submit(rendered)
    }

    fn flush(&self) -> bool {
        self.worker.flush()
    }

    fn close(&self) {
        self.worker.close();
    }

    fn is_closed(&self) -> bool {
        self.worker.is_closed()
    }

    fn is_degraded(&self) -> bool {
        self.worker.health().is_degraded()
    }
}
