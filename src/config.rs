//! Registry configuration.
//!
//! The host resolves its run mode however it likes (environment, config
//! file, CLI flag) and hands the result in; nothing here reads the process
//! environment. [`RunMode`] and [`FileRetention`] deserialise with `serde` so
//! they can sit inside the host's own configuration structs.

use std::{fmt, path::PathBuf, str::FromStr, sync::Arc};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    broadcast::BroadcastSink,
    level::{LevelTable, SharedLevelTable},
    registry::SinkFactory,
    sinks::FileRetention,
};

pub const DEFAULT_LOG_ROOT: &str = "logs";

/// Which default sink wiring new loggers get.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Rotating JSON files per service.
    Production,
    /// Console output plus the optional live broadcast channel.
    #[default]
    Development,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown run mode: {0}")]
pub struct RunModeError(String);

impl FromStr for RunMode {
    type Err = RunModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(RunModeError(other.to_owned())),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Production => "production",
            Self::Development => "development",
        })
    }
}

/// Builder-style configuration for [`LoggerRegistry`](crate::LoggerRegistry).
#[derive(Clone)]
pub struct RegistryConfig {
    mode: RunMode,
    levels: SharedLevelTable,
    log_root: PathBuf,
    retention: FileRetention,
    broadcast: Option<Arc<BroadcastSink>>,
    sink_factory: Option<Arc<dyn SinkFactory>>,
}

impl RegistryConfig {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            levels: SharedLevelTable::default(),
            log_root: PathBuf::from(DEFAULT_LOG_ROOT),
            retention: FileRetention::default(),
            broadcast: None,
            sink_factory: None,
        }
    }

    pub fn with_levels(mut self, levels: SharedLevelTable) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_level_table(self, table: LevelTable) -> Self {
        self.with_levels(SharedLevelTable::new(table))
    }

    /// Root directory for production file streams.
    pub fn with_log_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.log_root = root.into();
        self
    }

    pub fn with_retention(mut self, retention: FileRetention) -> Self {
        self.retention = retention;
        self
    }

    /// Attach a broadcast sink shared by every development logger.
    pub fn with_broadcast(mut self, sink: Arc<BroadcastSink>) -> Self {
        self.broadcast = Some(sink);
        self
    }

    /// Replace the default per-mode wiring.
    pub fn with_sink_factory(mut self, factory: Arc<dyn SinkFactory>) -> Self {
        self.sink_factory = Some(factory);
        self
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn levels(&self) -> &SharedLevelTable {
        &self.levels
    }

    pub fn log_root(&self) -> &PathBuf {
        &self.log_root
    }

    pub fn retention(&self) -> FileRetention {
        self.retention
    }

    pub fn broadcast(&self) -> Option<&Arc<BroadcastSink>> {
        self.broadcast.as_ref()
    }

    pub fn sink_factory(&self) -> Option<&Arc<dyn SinkFactory>> {
        self.sink_factory.as_ref()
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new(RunMode::default())
    }
}

impl fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("mode", &self.mode)
            .field("log_root", &self.log_root)
            .field("retention", &self.retention)
            .field("broadcast", &self.broadcast.is_some())
            .field("custom_sink_factory", &self.sink_factory.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("production", RunMode::Production)]
    #[case("PROD", RunMode::Production)]
    #[case(" development ", RunMode::Development)]
    #[case("dev", RunMode::Development)]
    fn parses_run_modes(#[case] input: &str, #[case] expected: RunMode) {
        assert_eq!(input.parse::<RunMode>(), Ok(expected));
    }

    #[test]
    fn rejects_unknown_mode() {
        assert_eq!(
            "staging".parse::<RunMode>(),
            Err(RunModeError("staging".into()))
        );
    }

    #[test]
    fn run_mode_deserialises_from_lowercase() {
        let mode: RunMode = serde_json::from_str("\"production\"").expect("valid mode");
        assert_eq!(mode, RunMode::Production);
        assert_eq!(mode.to_string(), "production");
    }

    #[test]
    fn builder_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.mode(), RunMode::Development);
        assert_eq!(config.log_root(), &PathBuf::from("logs"));
        assert!(config.broadcast().is_none());
        assert!(config.sink_factory().is_none());
    }
}
