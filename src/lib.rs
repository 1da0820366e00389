//! Multi-service logging with level windows, per-sink pipelines and a live
//! broadcast channel.
//!
//! A [`LoggerRegistry`] hands out one [`ServiceLogger`] per service. Each
//! logger routes records through a [`FormatPipeline`] per sink: a
//! [`LevelWindowFilter`] first, then optional enrichment, then a renderer.
//! Sinks (console, rotating files, memory, [`BroadcastSink`]) take the
//! rendered output and never report failures back to the caller.

pub mod broadcast;
pub mod chrono_fmt;
pub mod config;
pub mod filters;
pub mod formatter;
pub mod level;
pub mod log_record;
pub mod logger;
pub mod pipeline;
pub mod rate_limited_warner;
pub mod registry;
pub mod sink;
pub mod sinks;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use broadcast::{
    BroadcastConfig, BroadcastServer, BroadcastSink, ConnectionLost, ProbeReport,
    SubscriberConnection, SubscriberId,
};
pub use config::{RegistryConfig, RunMode, RunModeError};
pub use filters::{
    FilterBuildError, FilterWindow, LevelWindowBuilder, LevelWindowFilter, ScribeFilter, accepts,
};
pub use formatter::{Rendered, ScribeFormatter, SharedFormatter};
pub use level::{LevelError, LevelTable, Rank, SharedLevelTable, StandardLevel};
pub use log_record::{Metadata, ScribeRecord};
pub use logger::{ServiceLogger, SinkOwnership, SinkRoute};
pub use pipeline::{FilterStage, FormatPipeline, PipelineBuilder, Stage, TimestampStage};
pub use registry::{
    DefaultSinkFactory, LoggerRegistry, RegistryError, SinkFactory, global, install_global,
};
pub use sink::{ScribeSink, SinkBuildError, SinkError, SinkHealth};
pub use sinks::{ConsoleSink, FileRetention, FileSinkConfig, MemorySink, RotatingFileSink};

/// Installs the `logtest` global logger once per test process; `log` only
/// permits a single `set_logger` call, so each test reuses the same capture.
#[cfg(test)]
pub(crate) fn test_logger() -> logtest::Logger {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = logtest::Logger::start();
    });
    logtest::Logger
}
