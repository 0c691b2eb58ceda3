//! Registry of named loggers arranged by dotted name.
//!
//! `a.b.c` is a child of `a.b`, which is a child of `a`, which is a child of
//! the root. Creating a logger creates any missing ancestors. Structural
//! changes (creating loggers, attaching or detaching appenders) take the
//! hierarchy's structure lock shared; [`Hierarchy::lock`] takes it exclusively
//! so flush and fork preparation see a stable set of loggers and appenders.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::appender::flush_locked;
use crate::level::FemtoLevel;
use crate::logger::FemtoLogger;
use crate::shared_object::Handle;

/// Name reserved for the root logger.
pub const ROOT_LOGGER_NAME: &str = "root";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoggerNameError {
    #[error("invalid logger name: {0:?}")]
    Invalid(String),
}

/// State shared between a hierarchy and its loggers.
#[derive(Default)]
pub(crate) struct HierarchyState {
    structure: RwLock<()>,
    warned_no_appenders: AtomicBool,
}

impl HierarchyState {
    pub(crate) fn structure_read(&self) -> RwLockReadGuard<'_, ()> {
        self.structure.read()
    }

    // One warning per hierarchy, however many loggers lack appenders.
    pub(crate) fn warn_no_appenders(&self, logger: &str) {
        if !self.warned_no_appenders.swap(true, Ordering::Relaxed) {
            warn!("No appenders could be found for logger ({logger}).");
            warn!("Please initialize the logging system properly.");
        }
    }
}

pub struct Hierarchy {
    root: Handle<FemtoLogger>,
    loggers: RwLock<HashMap<String, Handle<FemtoLogger>>>,
    state: Arc<HierarchyState>,
}

impl Hierarchy {
    pub fn new() -> Self {
        let state = Arc::new(HierarchyState::default());
        let root = Handle::new(FemtoLogger::new(
            ROOT_LOGGER_NAME.to_owned(),
            Handle::null(),
            Some(FemtoLevel::Debug),
            Arc::clone(&state),
        ));
        Self {
            root,
            loggers: RwLock::new(HashMap::new()),
            state,
        }
    }

    pub fn root(&self) -> Handle<FemtoLogger> {
        self.root.clone()
    }

    /// Retrieve `name`, creating it and any missing ancestors.
    pub fn get_logger(&self, name: &str) -> Result<Handle<FemtoLogger>, LoggerNameError> {
        if name == ROOT_LOGGER_NAME {
            return Ok(self.root());
        }
        validate_name(name)?;
        if let Some(existing) = self.loggers.read().get(name) {
            return Ok(existing.clone());
        }
        let _structure = self.state.structure_read();
        let mut loggers = self.loggers.write();
        Ok(self.get_or_create(&mut loggers, name))
    }

    pub fn exists(&self, name: &str) -> bool {
        name == ROOT_LOGGER_NAME || self.loggers.read().contains_key(name)
    }

    /// Every named logger, sorted by name. The root is not included.
    pub fn current_loggers(&self) -> Vec<Handle<FemtoLogger>> {
        snapshot(&self.loggers.read())
    }

    /// Take the structure lock exclusively.
    pub fn lock(&self) -> HierarchyLocker<'_> {
        let guard = self.state.structure.write();
        let loggers = snapshot(&self.loggers.read());
        HierarchyLocker {
            root: self.root(),
            loggers,
            _guard: guard,
        }
    }

    /// Flush and close every appender, then detach them all.
    pub fn shutdown(&self) {
        let locker = self.lock();
        for logger in locker.all_loggers() {
            let Some(logger) = logger.get() else {
                continue;
            };
            for appender in logger.remove_all_appenders_unlocked() {
                if let Some(target) = appender.get() {
                    flush_locked(&target);
                    let _access = target.access_lock();
                    target.close();
                }
            }
        }
        debug!("Hierarchy: shutdown complete");
    }

    fn get_or_create(
        &self,
        loggers: &mut HashMap<String, Handle<FemtoLogger>>,
        name: &str,
    ) -> Handle<FemtoLogger> {
        if let Some(existing) = loggers.get(name) {
            return existing.clone();
        }
        let parent = match name.rsplit_once('.') {
            Some((parent_name, _)) => self.get_or_create(loggers, parent_name),
            None => self.root(),
        };
        let logger = Handle::new(FemtoLogger::new(
            name.to_owned(),
            parent,
            None,
            Arc::clone(&self.state),
        ));
        loggers.insert(name.to_owned(), logger.clone());
        logger
    }
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hierarchy")
            .field("loggers", &self.loggers.read().len())
            .finish()
    }
}

/// Exclusive hold on a hierarchy's structure with a consistent logger list.
pub struct HierarchyLocker<'a> {
    root: Handle<FemtoLogger>,
    loggers: Vec<Handle<FemtoLogger>>,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl HierarchyLocker<'_> {
    pub fn root(&self) -> &Handle<FemtoLogger> {
        &self.root
    }

    /// Named loggers as of when the lock was taken.
    pub fn loggers(&self) -> &[Handle<FemtoLogger>] {
        &self.loggers
    }

    /// Named loggers followed by the root.
    pub fn all_loggers(&self) -> impl Iterator<Item = &Handle<FemtoLogger>> {
        self.loggers.iter().chain(std::iter::once(&self.root))
    }
}

fn snapshot(loggers: &HashMap<String, Handle<FemtoLogger>>) -> Vec<Handle<FemtoLogger>> {
    let mut named: Vec<(&String, &Handle<FemtoLogger>)> = loggers.iter().collect();
    named.sort_by(|a, b| a.0.cmp(b.0));
    named.into_iter().map(|(_, logger)| logger.clone()).collect()
}

fn validate_name(name: &str) -> Result<(), LoggerNameError> {
    if name.is_empty()
        || name.starts_with('.')
        || name.ends_with('.')
        || name.split('.').any(str::is_empty)
    {
        return Err(LoggerNameError::Invalid(name.to_owned()));
    }
    Ok(())
}
