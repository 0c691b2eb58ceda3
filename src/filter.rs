//! Filtering trait for log records.
//!
//! Defines [`FemtoFilter`] which allows loggers and appenders to decide
//! whether a [`FemtoLogRecord`] should be processed, plus the level filter the
//! default factory registry knows how to build.

use crate::level::FemtoLevel;
use crate::log_record::FemtoLogRecord;

/// Trait implemented by all log filters.
///
/// Filters are `Send + Sync` so they can be shared across threads.
pub trait FemtoFilter: Send + Sync {
    /// Return `true` if `record` should be processed.
    fn should_log(&self, record: &FemtoLogRecord) -> bool;
}

/// Accepts records whose level lies within `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelRangeFilter {
    min: FemtoLevel,
    max: FemtoLevel,
}

impl LevelRangeFilter {
    pub fn new(min: FemtoLevel, max: FemtoLevel) -> Self {
        Self { min, max }
    }
}

impl Default for LevelRangeFilter {
    fn default() -> Self {
        Self::new(FemtoLevel::Trace, FemtoLevel::Critical)
    }
}

impl FemtoFilter for LevelRangeFilter {
    fn should_log(&self, record: &FemtoLogRecord) -> bool {
        (self.min..=self.max).contains(&record.level())
    }
}
