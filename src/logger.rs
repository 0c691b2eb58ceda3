//! Named loggers and record dispatch.
//!
//! A [`FemtoLogger`] decides whether a record is enabled, then hands it to
//! its own appenders and, while additivity allows, to those of each ancestor.
//! Loggers are created and owned by a [`Hierarchy`](crate::hierarchy::Hierarchy).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use log::warn;
// parking_lot avoids poisoning and matches crate-wide locking strategy
use parking_lot::RwLock;

use crate::appender::{SharedAppenderPtr, append_locked, flush_locked};
use crate::hierarchy::HierarchyState;
use crate::level::FemtoLevel;
use crate::log_record::FemtoLogRecord;
use crate::rate_limited_warner::RateLimitedWarner;
use crate::shared_object::Handle;

const LEVEL_UNSET: u8 = u8::MAX;

pub struct FemtoLogger {
    name: String,
    parent: Handle<FemtoLogger>,
    level: AtomicU8,
    additivity: AtomicBool,
    appenders: RwLock<Vec<SharedAppenderPtr>>,
    state: Arc<HierarchyState>,
    error_warner: RateLimitedWarner,
}

impl FemtoLogger {
    pub(crate) fn new(
        name: String,
        parent: Handle<FemtoLogger>,
        level: Option<FemtoLevel>,
        state: Arc<HierarchyState>,
    ) -> Self {
        Self {
            name,
            parent,
            level: AtomicU8::new(level.map_or(LEVEL_UNSET, u8::from)),
            additivity: AtomicBool::new(true),
            appenders: RwLock::new(Vec::new()),
            state,
            error_warner: RateLimitedWarner::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parent handle; null for the root logger.
    pub fn parent(&self) -> &Handle<FemtoLogger> {
        &self.parent
    }

    /// The level assigned to this logger, if any.
    pub fn level(&self) -> Option<FemtoLevel> {
        FemtoLevel::try_from(self.level.load(Ordering::Relaxed)).ok()
    }

    /// Assign a level, or `None` to inherit from the parent.
    pub fn set_level(&self, level: Option<FemtoLevel>) {
        self.level
            .store(level.map_or(LEVEL_UNSET, u8::from), Ordering::Relaxed);
    }

    /// The first level set on this logger or an ancestor.
    pub fn effective_level(&self) -> FemtoLevel {
        if let Some(level) = self.level() {
            return level;
        }
        let mut next = self.parent.get();
        while let Some(logger) = next {
            if let Some(level) = logger.level() {
                return level;
            }
            next = logger.parent.get();
        }
        FemtoLevel::Debug
    }

    pub fn is_enabled_for(&self, level: FemtoLevel) -> bool {
        level >= self.effective_level()
    }

    pub fn additivity(&self) -> bool {
        self.additivity.load(Ordering::Relaxed)
    }

    /// Control whether records also reach ancestor appenders.
    pub fn set_additivity(&self, additive: bool) {
        self.additivity.store(additive, Ordering::Relaxed);
    }

    /// Attach `appender`; attaching the same target twice has no effect.
    pub fn add_appender(&self, appender: SharedAppenderPtr) {
        if appender.is_null() {
            return;
        }
        let _structure = self.state.structure_read();
        let mut appenders = self.appenders.write();
        if !appenders.iter().any(|existing| existing.ptr_eq(&appender)) {
            appenders.push(appender);
        }
    }

    /// Detach `appender`. Returns `true` if it was attached.
    pub fn remove_appender(&self, appender: &SharedAppenderPtr) -> bool {
        let _structure = self.state.structure_read();
        let mut appenders = self.appenders.write();
        let before = appenders.len();
        appenders.retain(|existing| !existing.ptr_eq(appender));
        appenders.len() != before
    }

    /// Detach the appender called `name`, returning it.
    pub fn remove_appender_named(&self, name: &str) -> Option<SharedAppenderPtr> {
        let _structure = self.state.structure_read();
        let mut appenders = self.appenders.write();
        let index = appenders.iter().position(|appender| {
            appender
                .get()
                .is_some_and(|target| target.name() == name)
        })?;
        Some(appenders.remove(index))
    }

    pub fn remove_all_appenders(&self) {
        let _structure = self.state.structure_read();
        self.remove_all_appenders_unlocked();
    }

    // Caller holds the hierarchy lock.
    pub(crate) fn remove_all_appenders_unlocked(&self) -> Vec<SharedAppenderPtr> {
        std::mem::take(&mut *self.appenders.write())
    }

    /// Snapshot of the attached appenders.
    pub fn appenders(&self) -> Vec<SharedAppenderPtr> {
        self.appenders.read().clone()
    }

    pub fn appender(&self, name: &str) -> Option<SharedAppenderPtr> {
        self.appenders
            .read()
            .iter()
            .find(|appender| appender.get().is_some_and(|target| target.name() == name))
            .cloned()
    }

    /// Log `message` at `level` if enabled. Returns `true` if dispatched.
    pub fn log(&self, level: FemtoLevel, message: &str) -> bool {
        if !self.is_enabled_for(level) {
            return false;
        }
        self.call_appenders(&FemtoLogRecord::new(&self.name, level, message));
        true
    }

    /// Dispatch a prepared record without a level check.
    ///
    /// Returns the number of appenders that received it.
    pub fn call_appenders(&self, record: &FemtoLogRecord) -> usize {
        let mut writes = self.append_local(record);
        if self.additivity() {
            let mut next = self.parent.get();
            while let Some(logger) = next {
                writes += logger.append_local(record);
                if !logger.additivity() {
                    break;
                }
                next = logger.parent.get();
            }
        }
        if writes == 0 {
            self.state.warn_no_appenders(&self.name);
        }
        writes
    }

    /// Flush every attached appender. Returns `false` if any flush failed.
    pub fn flush(&self) -> bool {
        self.appenders()
            .iter()
            .filter_map(SharedAppenderPtr::get)
            .fold(true, |ok, target| flush_locked(&target) && ok)
    }

    fn append_local(&self, record: &FemtoLogRecord) -> usize {
        let appenders = self.appenders();
        for appender in &appenders {
            let Some(target) = appender.get() else {
                continue;
            };
            if let Err(err) = append_locked(&target, record) {
                self.error_warner.record_drop();
                self.error_warner.warn_if_due(|count| {
                    warn!(
                        "FemtoLogger '{}': appender '{}' failed: {err}; {count} records dropped",
                        self.name,
                        target.name()
                    );
                });
            }
        }
        appenders.len()
    }
}

impl std::fmt::Debug for FemtoLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FemtoLogger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("additivity", &self.additivity())
            .finish()
    }
}
