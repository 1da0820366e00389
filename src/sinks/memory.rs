//! In-memory sink that keeps every rendered record for inspection.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::{
    formatter::Rendered,
    sink::{ScribeSink, SinkError},
};

#[derive(Debug)]
pub struct MemorySink {
    name: String,
    records: Mutex<Vec<Rendered>>,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Snapshot of every record written so far, in arrival order.
    pub fn records(&self) -> Vec<Rendered> {
        self.records.lock().clone()
    }

    /// Wire form of every record written so far.
    pub fn texts(&self) -> Vec<String> {
        self.records.lock().iter().map(Rendered::to_text).collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl ScribeSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, rendered: Rendered) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        self.records.lock().push(rendered);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
