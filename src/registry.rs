//! Service registry mapping identifiers to wired loggers.
//!
//! The registry is the only place that creates or destroys
//! [`ServiceLogger`]s. Lookups hand out `Arc` clones; `services` and
//! `loggers` return snapshots rather than live views. A single registry can
//! be installed process-wide with [`install_global`].

use std::{collections::BTreeMap, sync::Arc};

use log::debug;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use thiserror::Error;

use crate::{
    config::{RegistryConfig, RunMode},
    filters::{FilterBuildError, LevelWindowBuilder, LevelWindowFilter},
    level::{SharedLevelTable, StandardLevel},
    logger::{ServiceLogger, SinkRoute},
    pipeline::FormatPipeline,
    sink::{ScribeSink, SinkBuildError},
    sinks::{ConsoleSink, FileSinkConfig, RotatingFileSink},
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("service already registered: {0}")]
    DuplicateService(String),
    #[error("invalid service name: {0:?}")]
    InvalidService(String),
    #[error(transparent)]
    SinkBuild(#[from] SinkBuildError),
    #[error(transparent)]
    Filter(#[from] FilterBuildError),
    #[error("a global registry is already installed")]
    AlreadyInstalled,
}

/// Builds the sink routes for a newly added service.
pub trait SinkFactory: Send + Sync {
    fn routes(
        &self,
        service: &str,
        config: &RegistryConfig,
    ) -> Result<Vec<SinkRoute>, RegistryError>;
}

/// Wiring selected by [`RunMode`].
///
/// * Production: an `error` file stream (error only) and a `general` file
///   stream (warn through debug), both rendered as JSON.
/// * Development: console output for error through internal, a framed
///   console view for `box`, and the configured broadcast sink (error through
///   box) when there is one.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSinkFactory;

fn window(
    levels: &SharedLevelTable,
    min: StandardLevel,
    max: StandardLevel,
) -> Result<LevelWindowFilter, FilterBuildError> {
    LevelWindowBuilder::new()
        .with_min(min.as_str())
        .with_max(max.as_str())
        .build(levels)
}

impl SinkFactory for DefaultSinkFactory {
    fn routes(
        &self,
        service: &str,
        config: &RegistryConfig,
    ) -> Result<Vec<SinkRoute>, RegistryError> {
        use StandardLevel as L;

        let levels = config.levels();
        let mut routes = Vec::new();
        match config.mode() {
            RunMode::Production => {
                let streams = [("error", L::Error, L::Error), ("general", L::Warn, L::Debug)];
                for (stream, min, max) in streams {
                    let sink = RotatingFileSink::new(
                        FileSinkConfig::new(config.log_root(), service, stream)
                            .with_retention(config.retention()),
                    )?;
                    routes.push(SinkRoute::owned(
                        FormatPipeline::json(window(levels, min, max)?),
                        Arc::new(sink),
                    ));
                }
            }
            RunMode::Development => {
                let console: Arc<dyn ScribeSink> = Arc::new(ConsoleSink::stdout()?);
                routes.push(SinkRoute::owned(
                    FormatPipeline::console(window(levels, L::Error, L::Internal)?),
                    Arc::clone(&console),
                ));
                routes.push(SinkRoute::owned(
                    FormatPipeline::console(window(levels, L::Box, L::Box)?),
                    console,
                ));
                if let Some(broadcast) = config.broadcast() {
                    let sink: Arc<dyn ScribeSink> = broadcast.clone();
                    routes.push(SinkRoute::shared(
                        FormatPipeline::broadcast(window(levels, L::Error, L::Box)?),
                        sink,
                    ));
                }
            }
        }
        Ok(routes)
    }
}

fn validate_service(service: &str) -> Result<(), RegistryError> {
    if service.trim().is_empty() || service.contains(['/', '\\']) || service.starts_with('.') {
        return Err(RegistryError::InvalidService(service.to_owned()));
    }
    Ok(())
}

pub struct LoggerRegistry {
    config: RegistryConfig,
    loggers: RwLock<BTreeMap<String, Arc<ServiceLogger>>>,
}

impl LoggerRegistry {
    /// Build a registry and a logger for each of `services`.
    pub fn new<I, S>(config: RegistryConfig, services: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let registry = Self {
            config,
            loggers: RwLock::new(BTreeMap::new()),
        };
        for service in services {
            registry.add(service.as_ref())?;
        }
        Ok(registry)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn mode(&self) -> RunMode {
        self.config.mode()
    }

    pub fn levels(&self) -> &SharedLevelTable {
        self.config.levels()
    }

    /// Register `service` with the configured wiring.
    ///
    /// A duplicate is rejected and the existing logger is left untouched.
    pub fn add(&self, service: &str) -> Result<Arc<ServiceLogger>, RegistryError> {
        validate_service(service)?;
        if self.contains(service) {
            return Err(RegistryError::DuplicateService(service.to_owned()));
        }
        let routes = match self.config.sink_factory() {
            Some(factory) => factory.routes(service, &self.config)?,
            None => DefaultSinkFactory.routes(service, &self.config)?,
        };
        self.add_with_routes(service, routes)
    }

    /// Register `service` with explicitly supplied routes.
    pub fn add_with_routes(
        &self,
        service: &str,
        routes: Vec<SinkRoute>,
    ) -> Result<Arc<ServiceLogger>, RegistryError> {
        validate_service(service)?;
        let logger = Arc::new(ServiceLogger::new(service, routes));
        let mut loggers = self.loggers.write();
        if loggers.contains_key(service) {
            drop(loggers);
            logger.close();
            return Err(RegistryError::DuplicateService(service.to_owned()));
        }
        loggers.insert(service.to_owned(), Arc::clone(&logger));
        drop(loggers);
        debug!("registry: added {service}");
        Ok(logger)
    }

    /// Remove `service`, closing the sinks it owns before returning.
    pub fn remove(&self, service: &str) -> bool {
        let removed = self.loggers.write().remove(service);
        match removed {
            Some(logger) => {
                logger.close();
                debug!("registry: removed {service}");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, service: &str) -> Option<Arc<ServiceLogger>> {
        self.loggers.read().get(service).cloned()
    }

    pub fn contains(&self, service: &str) -> bool {
        self.loggers.read().contains_key(service)
    }

    /// Snapshot of registered service names, sorted.
    pub fn services(&self) -> Vec<String> {
        self.loggers.read().keys().cloned().collect()
    }

    /// Snapshot of registered loggers, sorted by service.
    pub fn loggers(&self) -> Vec<Arc<ServiceLogger>> {
        self.loggers.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.loggers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.read().is_empty()
    }

    /// Flush every logger; `true` only if all sinks confirmed.
    pub fn flush(&self) -> bool {
        self.loggers()
            .iter()
            .fold(true, |ok, logger| logger.flush() && ok)
    }

    /// Remove every service, closing their sinks.
    pub fn shutdown(&self) {
        let drained = std::mem::take(&mut *self.loggers.write());
        for logger in drained.values() {
            logger.close();
        }
    }
}

static GLOBAL: OnceCell<LoggerRegistry> = OnceCell::new();

/// Install the process-wide registry. Only the first call succeeds.
pub fn install_global(registry: LoggerRegistry) -> Result<&'static LoggerRegistry, RegistryError> {
    GLOBAL.set(registry).map_err(|rejected| {
        rejected.shutdown();
        RegistryError::AlreadyInstalled
    })?;
    GLOBAL.get().ok_or(RegistryError::AlreadyInstalled)
}

/// The registry installed by [`install_global`], if any.
pub fn global() -> Option<&'static LoggerRegistry> {
    GLOBAL.get()
}
