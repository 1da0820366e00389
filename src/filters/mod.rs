//! Filtering components for log records.
//!
//! Provides the [`ScribeFilter`] trait along with the level window filter
//! and its builder.

use std::sync::Arc;

use thiserror::Error;

use crate::level::LevelError;
use crate::log_record::ScribeRecord;

pub mod level_window;

pub use level_window::{FilterWindow, LevelWindowBuilder, LevelWindowFilter, accepts};

/// Trait implemented by all log filters.
///
/// Filters are `Send + Sync` so they can be shared across threads.
pub trait ScribeFilter: Send + Sync {
    /// Return `true` if `record` should be processed.
    fn should_log(&self, record: &ScribeRecord) -> bool;
}

impl<F: ScribeFilter + ?Sized> ScribeFilter for Arc<F> {
    fn should_log(&self, record: &ScribeRecord) -> bool {
        (**self).should_log(record)
    }
}

/// Errors that may occur while building a filter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterBuildError {
    /// A window bound names a level missing from the table.
    #[error(transparent)]
    UnknownLevel(#[from] LevelError),
    /// The window minimum ranks above its maximum.
    #[error("invalid filter window: min '{min}' (rank {min_rank}) exceeds max '{max}' (rank {max_rank})")]
    InvalidWindow {
        min: String,
        min_rank: u32,
        max: String,
        max_rank: u32,
    },
    /// Required configuration was not supplied.
    #[error("invalid filter configuration: {0}")]
    InvalidConfig(String),
}
