//! An appender that accumulates records in memory for test assertions.
//!
//! This module is shared across unit and integration tests so that each test
//! module does not need its own copy of the same boilerplate.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::appender::{AppenderError, FemtoAppender, ForkHandler};
use crate::log_record::FemtoLogRecord;

#[derive(Default)]
struct Collected {
    records: Mutex<Vec<FemtoLogRecord>>,
    flushes: AtomicUsize,
    fork_prepares: AtomicUsize,
    fork_children: AtomicUsize,
    closed: AtomicBool,
}

/// Appender that stores every record it receives for later inspection.
///
/// Clones share the same storage, so a test can keep one clone while the
/// other is attached to a logger.
#[derive(Clone)]
pub struct CollectingAppender {
    name: String,
    inner: Arc<Collected>,
}

impl CollectingAppender {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            inner: Arc::default(),
        }
    }

    /// Return a snapshot of all records received so far.
    pub fn collected(&self) -> Vec<FemtoLogRecord> {
        self.inner.records.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.inner
            .records
            .lock()
            .iter()
            .map(|record| record.message.clone())
            .collect()
    }

    pub fn flush_count(&self) -> usize {
        self.inner.flushes.load(Ordering::SeqCst)
    }

    pub fn fork_prepare_count(&self) -> usize {
        self.inner.fork_prepares.load(Ordering::SeqCst)
    }

    pub fn fork_child_count(&self) -> usize {
        self.inner.fork_children.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl FemtoAppender for CollectingAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, record: &FemtoLogRecord) -> Result<(), AppenderError> {
        if self.is_closed() {
            return Err(AppenderError::Closed);
        }
        self.inner.records.lock().push(record.clone());
        Ok(())
    }

    fn flush(&self) -> bool {
        self.inner.flushes.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    fn as_fork_handler(&self) -> Option<&dyn ForkHandler> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ForkHandler for CollectingAppender {
    fn prepare_fork(&self) {
        self.inner.fork_prepares.fetch_add(1, Ordering::SeqCst);
    }

    fn after_fork_child(&self) {
        self.inner.fork_children.fetch_add(1, Ordering::SeqCst);
    }
}
