//! Per-service logger that routes records to its sinks.
//!
//! A [`ServiceLogger`] owns a list of [`SinkRoute`]s. Each route pairs one
//! [`FormatPipeline`] with one sink, so every sink sees the record filtered
//! and rendered for its own format. Emitting a record never fails: rejected
//! records are dropped silently and delivery failures are reported by the
//! sink itself.

mod convenience_methods;

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::debug;

use crate::{
    log_record::{Metadata, ScribeRecord},
    pipeline::FormatPipeline,
    sink::ScribeSink,
};

/// Who is responsible for closing a route's sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkOwnership {
    /// Closed together with the logger.
    Owned,
    /// Shared with other loggers; the creator closes it.
    Shared,
}

/// One pipeline feeding one sink.
#[derive(Clone)]
pub struct SinkRoute {
    pipeline: FormatPipeline,
    sink: Arc<dyn ScribeSink>,
    ownership: SinkOwnership,
}

impl SinkRoute {
    pub fn owned(pipeline: FormatPipeline, sink: Arc<dyn ScribeSink>) -> Self {
        Self {
            pipeline,
            sink,
            ownership: SinkOwnership::Owned,
        }
    }

    pub fn shared(pipeline: FormatPipeline, sink: Arc<dyn ScribeSink>) -> Self {
        Self {
            pipeline,
            sink,
            ownership: SinkOwnership::Shared,
        }
    }

    pub fn pipeline(&self) -> &FormatPipeline {
        &self.pipeline
    }

    pub fn sink(&self) -> &Arc<dyn ScribeSink> {
        &self.sink
    }

    pub fn ownership(&self) -> SinkOwnership {
        self.ownership
    }

    /// Run the pipeline and hand the result to the sink. Refused records are
    /// reported by the sink's own throttled health warnings.
    fn deliver(&self, record: &ScribeRecord) -> bool {
        self.pipeline
            .run(record)
            .is_some_and(|rendered| self.sink.write(rendered).is_ok())
    }
}

impl fmt::Debug for SinkRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkRoute")
            .field("sink", &self.sink.name())
            .field("ownership", &self.ownership)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

/// Logger bound to one service identifier.
pub struct ServiceLogger {
    service: String,
    routes: Vec<SinkRoute>,
    closed: AtomicBool,
}

impl ServiceLogger {
    pub fn new(service: impl Into<String>, routes: Vec<SinkRoute>) -> Self {
        Self {
            service: service.into(),
            routes,
            closed: AtomicBool::new(false),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn routes(&self) -> &[SinkRoute] {
        &self.routes
    }

    /// Emit a record; returns how many sinks accepted it.
    pub fn log(&self, level: &str, message: &str, metadata: impl Into<Metadata>) -> usize {
        let record = ScribeRecord::new(&self.service, level, message).with_metadata(metadata);
        self.log_record(&record)
    }

    /// Route an already-built record through every sink.
    pub fn log_record(&self, record: &ScribeRecord) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.routes
            .iter()
            .filter(|route| route.deliver(record))
            .count()
    }

    /// Flush every sink; `true` only if all of them confirmed.
    pub fn flush(&self) -> bool {
        self.routes
            .iter()
            .fold(true, |ok, route| route.sink.flush() && ok)
    }

    /// Close the sinks this logger owns. Shared sinks are left open.
    /// Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for route in &self.routes {
            if route.ownership == SinkOwnership::Owned {
                route.sink.close();
            }
        }
        debug!("{}: logger closed", self.service);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Names of sinks currently reporting a degraded resource.
    pub fn degraded_sinks(&self) -> Vec<String> {
        self.routes
            .iter()
            .filter(|route| route.sink.is_degraded())
            .map(|route| route.sink.name().to_owned())
            .collect()
    }
}

impl fmt::Debug for ServiceLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceLogger")
            .field("service", &self.service)
            .field("routes", &self.routes)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for ServiceLogger {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        filters::{LevelWindowBuilder, LevelWindowFilter},
        formatter::Rendered,
        level::SharedLevelTable,
        sink::SinkError,
        sinks::MemorySink,
    };
    use rstest::{fixture, rstest};

    fn window(min: &str, max: &str) -> LevelWindowFilter {
        LevelWindowBuilder::new()
            .with_min(min)
            .with_max(max)
            .build(&SharedLevelTable::default())
            .expect("valid window")
    }

    fn broadcast(min: &str, max: &str) -> FormatPipeline {
        FormatPipeline::broadcast(window(min, max))
    }

    #[fixture]
    fn memory() -> Arc<MemorySink> {
        Arc::new(MemorySink::new("mem"))
    }

    #[rstest]
    fn routes_each_sink_through_its_own_pipeline(memory: Arc<MemorySink>) {
        let errors = Arc::new(MemorySink::new("errors"));
        let logger = ServiceLogger::new(
            "api",
            vec![
                SinkRoute::owned(broadcast("error", "box"), memory.clone()),
                SinkRoute::owned(broadcast("error", "error"), errors.clone()),
            ],
        );

        assert_eq!(logger.error("down", ()), 2);
        assert_eq!(logger.info("up", ()), 1);
        assert_eq!(memory.texts(), vec!["down", "up"]);
        assert_eq!(errors.texts(), vec!["down"]);
    }

    #[rstest]
    fn unknown_levels_are_dropped_not_raised(memory: Arc<MemorySink>) {
        let logger = ServiceLogger::new(
            "api",
            vec![SinkRoute::owned(broadcast("error", "box"), memory.clone())],
        );
        assert_eq!(logger.log("critical", "??", ()), 0);
        assert!(memory.is_empty());
    }

    struct Failing;

    impl ScribeSink for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn write(&self, _rendered: Rendered) -> Result<(), SinkError> {
            Err(SinkError::Io(std::io::Error::other("disk gone")))
        }

        fn close(&self) {}

        fn is_closed(&self) -> bool {
            false
        }

        fn is_degraded(&self) -> bool {
            true
        }
    }

    #[rstest]
    fn failing_sink_does_not_affect_others(memory: Arc<MemorySink>) {
        let logger = ServiceLogger::new(
            "api",
            vec![
                SinkRoute::owned(broadcast("error", "box"), Arc::new(Failing)),
                SinkRoute::owned(broadcast("error", "box"), memory.clone()),
            ],
        );
        assert_eq!(logger.warn("still here", ()), 1);
        assert_eq!(memory.texts(), vec!["still here"]);
        assert_eq!(logger.degraded_sinks(), vec!["failing"]);
    }

    #[rstest]
    fn close_leaves_shared_sinks_open(memory: Arc<MemorySink>) {
        let shared = Arc::new(MemorySink::new("shared"));
        let logger = ServiceLogger::new(
            "api",
            vec![
                SinkRoute::owned(broadcast("error", "box"), memory.clone()),
                SinkRoute::shared(broadcast("error", "box"), shared.clone()),
            ],
        );
        logger.close();
        logger.close();
        assert!(memory.is_closed());
        assert!(!shared.is_closed());
        assert_eq!(logger.info("after close", ()), 0);
    }
}
