//! Builder and implementation for a rank-window filter.
//!
//! A record passes when `rank(min) <= rank(record.level) <= rank(max)`.
//! Levels missing from the table never pass.

use log::debug;

use super::{FilterBuildError, ScribeFilter};
use crate::{
    level::{LevelTable, SharedLevelTable},
    log_record::ScribeRecord,
};

/// Validated `[min, max]` window expressed in level names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterWindow {
    min: String,
    max: String,
}

impl FilterWindow {
    /// Validate a window against `table`.
    ///
    /// `max` defaults to the table's highest ranked level.
    pub fn new(table: &LevelTable, min: &str, max: Option<&str>) -> Result<Self, FilterBuildError> {
        let max = max.unwrap_or_else(|| table.highest().name());
        let min_rank = table.rank_of(min)?;
        let max_rank = table.rank_of(max)?;
        let min = min.trim().to_ascii_lowercase();
        let max = max.trim().to_ascii_lowercase();
        if min_rank > max_rank {
            return Err(FilterBuildError::InvalidWindow {
                min,
                min_rank,
                max,
                max_rank,
            });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> &str {
        &self.min
    }

    pub fn max(&self) -> &str {
        &self.max
    }
}

/// Return whether `record` falls inside `window` under `table`.
///
/// Any name that cannot be resolved, including a window bound dropped by a
/// table replacement, rejects the record.
pub fn accepts(record: &ScribeRecord, window: &FilterWindow, table: &LevelTable) -> bool {
    match (
        table.rank_of(window.min()),
        table.rank_of(record.level()),
        table.rank_of(window.max()),
    ) {
        (Ok(lo), Ok(rank), Ok(hi)) => lo <= rank && rank <= hi,
        _ => false,
    }
}

#[derive(Clone, Debug)]
pub struct LevelWindowFilter {
    window: FilterWindow,
    table: SharedLevelTable,
}

impl LevelWindowFilter {
    pub fn window(&self) -> &FilterWindow {
        &self.window
    }
}

impl ScribeFilter for LevelWindowFilter {
    fn should_log(&self, record: &ScribeRecord) -> bool {
        let table = self.table.snapshot();
        let passed = accepts(record, &self.window, &table);
        if !passed && !table.contains(record.level()) {
            debug!(
                "ScribeFilter: level '{}' from service '{}' is not in the level table; record rejected",
                record.level(),
                record.service()
            );
        }
        passed
    }
}

/// Builder for [`LevelWindowFilter`].
#[derive(Clone, Debug, Default)]
pub struct LevelWindowBuilder {
    min: Option<String>,
    max: Option<String>,
}

impl LevelWindowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the most severe level allowed through.
    pub fn with_min(mut self, level: impl Into<String>) -> Self {
        self.min = Some(level.into());
        self
    }

    /// Set the most verbose level allowed through.
    pub fn with_max(mut self, level: impl Into<String>) -> Self {
        self.max = Some(level.into());
        self
    }

    /// Validate the window against the current table and build the filter.
    pub fn build(&self, table: &SharedLevelTable) -> Result<LevelWindowFilter, FilterBuildError> {
        let min = self
            .min
            .as_deref()
            .ok_or_else(|| FilterBuildError::InvalidConfig("min level is required".into()))?;
        let window = FilterWindow::new(&table.snapshot(), min, self.max.as_deref())?;
        Ok(LevelWindowFilter {
            window,
            table: table.clone(),
        })
    }
}
