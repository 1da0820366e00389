//! Severity levels and the rank table used for every level comparison.
//!
//! [`LevelTable`] is an ordered list of `(name, rank)` pairs. Ranks are
//! strictly increasing and names are unique, so comparisons are total. The
//! table is never mutated in place: [`SharedLevelTable::replace_all`] swaps a
//! complete table and readers keep whatever snapshot they already hold.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

/// Numeric severity rank. Lower ranks are more severe.
pub type Rank = u32;

/// Errors raised by level lookups and table construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LevelError {
    /// The level name (or rank) has no entry in the table.
    #[error("unknown log level: {0}")]
    UnknownLevel(String),
    /// The supplied table violates the ordering or uniqueness rules.
    #[error("invalid level table: {0}")]
    InvalidTable(String),
}

/// The levels shipped in the default table.
///
/// Convenience logging methods are generated from this list, so adding a
/// level here is the only way to grow the static API surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StandardLevel {
    Error,
    Warn,
    Info,
    Debug,
    Success,
    Verbose,
    Internal,
    Box,
}

impl StandardLevel {
    /// Every standard level in rank order.
    pub const ALL: [StandardLevel; 8] = [
        Self::Error,
        Self::Warn,
        Self::Info,
        Self::Debug,
        Self::Success,
        Self::Verbose,
        Self::Internal,
        Self::Box,
    ];

    /// Lowercase name used in records and tables.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Success => "success",
            Self::Verbose => "verbose",
            Self::Internal => "internal",
            Self::Box => "box",
        }
    }

    /// Rank assigned by [`LevelTable::default`].
    pub const fn default_rank(self) -> Rank {
        self as Rank
    }
}

impl fmt::Display for StandardLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StandardLevel {
    type Err = LevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == lowered)
            .ok_or_else(|| LevelError::UnknownLevel(s.to_owned()))
    }
}

/// One `(name, rank)` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelEntry {
    name: String,
    rank: Rank,
}

impl LevelEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }
}

/// Ordered, validated table of level names and ranks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelTable {
    entries: Vec<LevelEntry>,
}

impl LevelTable {
    /// Build a table from `(name, rank)` pairs.
    ///
    /// Names are normalised to lowercase. The pairs must be supplied in
    /// strictly increasing rank order and must not repeat a name.
    pub fn new<I, S>(pairs: I) -> Result<Self, LevelError>
    where
        I: IntoIterator<Item = (S, Rank)>,
        S: Into<String>,
    {
        let mut entries: Vec<LevelEntry> = Vec::new();
        for (name, rank) in pairs {
            let name = name.into().trim().to_ascii_lowercase();
            if name.is_empty() {
                return Err(LevelError::InvalidTable("level names must not be empty".into()));
            }
            if entries.iter().any(|e| e.name == name) {
                return Err(LevelError::InvalidTable(format!(
                    "duplicate level name '{name}'"
                )));
            }
            if let Some(prev) = entries.last()
                && rank <= prev.rank
            {
                return Err(LevelError::InvalidTable(format!(
                    "rank {rank} for '{name}' must be greater than {} for '{}'",
                    prev.rank, prev.name
                )));
            }
            entries.push(LevelEntry { name, rank });
        }
        if entries.is_empty() {
            return Err(LevelError::InvalidTable("table must contain at least one level".into()));
        }
        Ok(Self { entries })
    }

    /// Return the rank for `name`, matching case-insensitively.
    pub fn rank_of(&self, name: &str) -> Result<Rank, LevelError> {
        self.find(name)
            .map(LevelEntry::rank)
            .ok_or_else(|| LevelError::UnknownLevel(name.to_owned()))
    }

    /// Return the level name that carries `rank`.
    pub fn name_of(&self, rank: Rank) -> Result<&str, LevelError> {
        self.entries
            .iter()
            .find(|e| e.rank == rank)
            .map(LevelEntry::name)
            .ok_or_else(|| LevelError::UnknownLevel(format!("rank {rank}")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// The most verbose (highest ranked) level; the default window maximum.
    pub fn highest(&self) -> &LevelEntry {
        // `new` rejects empty tables.
        &self.entries[self.entries.len() - 1]
    }

    /// The most severe (lowest ranked) level.
    pub fn lowest(&self) -> &LevelEntry {
        &self.entries[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &LevelEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, name: &str) -> Option<&LevelEntry> {
        let name = name.trim();
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            entries: StandardLevel::ALL
                .into_iter()
                .map(|level| LevelEntry {
                    name: level.as_str().to_owned(),
                    rank: level.default_rank(),
                })
                .collect(),
        }
    }
}

/// Handle to a level table that can be replaced wholesale.
///
/// Clones share the same slot. Readers call [`snapshot`](Self::snapshot) and
/// work against an immutable `Arc<LevelTable>` for the duration of one
/// decision.
#[derive(Clone, Debug, Default)]
pub struct SharedLevelTable {
    inner: Arc<RwLock<Arc<LevelTable>>>,
}

impl SharedLevelTable {
    pub fn new(table: LevelTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    /// Return the table currently in effect.
    pub fn snapshot(&self) -> Arc<LevelTable> {
        Arc::clone(&self.inner.read())
    }

    /// Swap in `table` as a whole and return the table it replaced.
    ///
    /// Ranks captured from the previous table are not updated.
    pub fn replace_all(&self, table: LevelTable) -> Arc<LevelTable> {
        let mut slot = self.inner.write();
        std::mem::replace(&mut *slot, Arc::new(table))
    }

    pub fn rank_of(&self, name: &str) -> Result<Rank, LevelError> {
        self.snapshot().rank_of(name)
    }
}
