//! Contract between loggers and the sinks that receive their records.
//!
//! Appenders are shared through [`SharedAppenderPtr`] handles. Callers hold
//! the target's access lock while invoking `append` or `flush`, so an
//! implementation never sees those calls interleave on one instance.

use std::any::Any;

use thiserror::Error;

use crate::log_record::FemtoLogRecord;
use crate::shared_object::{Handle, SharedObject};
use crate::wire_buffer::BufferError;

/// Errors an appender may report for a single record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppenderError {
    /// The appender's queue is full and the record was dropped.
    #[error("appender queue is full")]
    QueueFull,
    /// The appender has been closed.
    #[error("appender is closed")]
    Closed,
    /// The record could not be encoded.
    #[error("record encoding failed: {0}")]
    Encode(#[from] BufferError),
    /// Writing to the sink failed.
    #[error("appender I/O failed: {0}")]
    Io(String),
}

/// Trait implemented by every appender.
///
/// Appenders are `Send + Sync` so loggers on any thread can reach them.
pub trait FemtoAppender: Send + Sync {
    /// Name used to look the appender up on a logger.
    fn name(&self) -> &str;

    /// Deliver `record` to the sink.
    fn append(&self, record: &FemtoLogRecord) -> Result<(), AppenderError>;

    /// Push buffered output to the sink. Returns `true` on success.
    fn flush(&self) -> bool {
        true
    }

    /// Release resources; later appends fail with [`AppenderError::Closed`].
    fn close(&self) {}

    /// Appenders that must act before the process forks return themselves.
    fn as_fork_handler(&self) -> Option<&dyn ForkHandler> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Notifications around `fork()`.
pub trait ForkHandler {
    /// Bring the appender to a state that is safe to duplicate.
    fn prepare_fork(&self);

    /// Runs in the child after a fork. Threads owned by the appender do not
    /// exist there; implementations must abandon them without joining.
    fn after_fork_child(&self) {}
}

/// Shared, swappable reference to an appender.
pub type SharedAppenderPtr = Handle<Box<dyn FemtoAppender>>;

/// Wrap `appender` in a fresh shared handle.
pub fn shared_appender(appender: impl FemtoAppender + 'static) -> SharedAppenderPtr {
    Handle::new(Box::new(appender))
}

/// Invoke `append` with the target's access lock held.
pub fn append_locked(
    target: &SharedObject<Box<dyn FemtoAppender>>,
    record: &FemtoLogRecord,
) -> Result<(), AppenderError> {
    let _guard = target.access_lock();
    target.append(record)
}

/// Invoke `flush` with the target's access lock held.
pub fn flush_locked(target: &SharedObject<Box<dyn FemtoAppender>>) -> bool {
    let _guard = target.access_lock();
    target.flush()
}

/// Invoke `prepare_fork` with the target's access lock held, if supported.
pub fn prepare_fork_locked(target: &SharedObject<Box<dyn FemtoAppender>>) -> bool {
    let _guard = target.access_lock();
    match target.as_fork_handler() {
        Some(handler) => {
            handler.prepare_fork();
            true
        }
        None => false,
    }
}

/// Deliver the child-side fork notification, if supported.
///
/// The access lock is not taken: a thread that held it in the parent does
/// not exist in the child, so the lock may never be released.
pub fn after_fork_child_unlocked(target: &SharedObject<Box<dyn FemtoAppender>>) -> bool {
    match target.as_fork_handler() {
        Some(handler) => {
            handler.after_fork_child();
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::FemtoLevel;
    use static_assertions::assert_impl_all;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        appended: AtomicUsize,
        dropped: Arc<AtomicUsize>,
    }

    impl FemtoAppender for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn append(&self, _record: &FemtoLogRecord) -> Result<(), AppenderError> {
            self.appended.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl Drop for Counting {
        fn drop(&mut self) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn shared_appender_ptr_is_send_sync() {
        assert_impl_all!(SharedAppenderPtr: Send, Sync);
    }

    #[test]
    fn concrete_drop_runs_through_trait_object_handle() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let handle = shared_appender(Counting {
            appended: AtomicUsize::new(0),
            dropped: Arc::clone(&dropped),
        });
        let alias = handle.clone();
        let target = handle.get().expect("target present");
        append_locked(&target, &FemtoLogRecord::new("core", FemtoLevel::Info, "m"))
            .expect("append succeeds");
        assert!(flush_locked(&target));
        assert!(!prepare_fork_locked(&target));
        assert!(!after_fork_child_unlocked(&target));
        let counting = target
            .as_any()
            .downcast_ref::<Counting>()
            .expect("concrete type");
        assert_eq!(counting.appended.load(Ordering::SeqCst), 1);
        drop(target);
        drop(handle);
        assert_eq!(dropped.load(Ordering::SeqCst), 0);
        drop(alias);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }
}
