//! The process-wide logging context.
//!
//! One [`DefaultContext`] exists per process. It is allocated on first use
//! under a double-checked guard, moves through [`ContextState`] exactly
//! once, and is torn down by the exit hook. The exit and fork hooks only
//! ever look at an existing context; they never allocate one.

pub mod per_thread;

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU8, AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use log::{debug, error};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::appender::{after_fork_child_unlocked, flush_locked, prepare_fork_locked};
use crate::hierarchy::Hierarchy;
use crate::spi::{
    AppenderFactoryRegistry, FilterFactoryRegistry, LayoutFactoryRegistry, LocaleFactoryRegistry,
    register_default_factories,
};

/// Lifecycle of the process-wide context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ContextState {
    Uninitialized = 0,
    Initialized = 1,
    Destroyed = 2,
}

impl ContextState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ContextState::Initialized,
            2 => ContextState::Destroyed,
            _ => ContextState::Uninitialized,
        }
    }
}

/// Shared state behind every logger in the process.
pub struct DefaultContext {
    console_mutex: Arc<Mutex<()>>,
    hierarchy: Arc<Hierarchy>,
    appender_factories: AppenderFactoryRegistry,
    layout_factories: LayoutFactoryRegistry,
    filter_factories: FilterFactoryRegistry,
    locale_factories: LocaleFactoryRegistry,
    // Microseconds since the Unix epoch; atomic so the fork child can reset
    // it without taking a lock another thread may have held.
    time_base: AtomicI64,
    generation: u64,
}

impl DefaultContext {
    fn new(generation: u64) -> Self {
        let context = Self {
            console_mutex: Arc::new(Mutex::new(())),
            hierarchy: Arc::new(Hierarchy::new()),
            appender_factories: AppenderFactoryRegistry::new(),
            layout_factories: LayoutFactoryRegistry::new(),
            filter_factories: FilterFactoryRegistry::new(),
            locale_factories: LocaleFactoryRegistry::new(),
            time_base: AtomicI64::new(Utc::now().timestamp_micros()),
            generation,
        };
        register_default_factories(
            &context.appender_factories,
            &context.layout_factories,
            &context.filter_factories,
            &context.locale_factories,
        );
        context
    }

    pub fn hierarchy(&self) -> &Arc<Hierarchy> {
        &self.hierarchy
    }

    /// Mutex serializing writes to shared text streams.
    pub fn console_output_mutex(&self) -> &Arc<Mutex<()>> {
        &self.console_mutex
    }

    pub fn appender_factories(&self) -> &AppenderFactoryRegistry {
        &self.appender_factories
    }

    pub fn layout_factories(&self) -> &LayoutFactoryRegistry {
        &self.layout_factories
    }

    pub fn filter_factories(&self) -> &FilterFactoryRegistry {
        &self.filter_factories
    }

    pub fn locale_factories(&self) -> &LocaleFactoryRegistry {
        &self.locale_factories
    }

    /// Reference time recorded at initialization (or after a fork).
    pub fn time_base(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.time_base.load(Ordering::Relaxed))
            .unwrap_or_default()
    }

    pub fn reset_time_base(&self) {
        self.time_base
            .store(Utc::now().timestamp_micros(), Ordering::Relaxed);
    }

    /// Allocation counter; bumps each time a context is created.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for DefaultContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultContext")
            .field("generation", &self.generation)
            .field("time_base", &self.time_base())
            .finish()
    }
}

static CONTEXT: Lazy<ArcSwapOption<DefaultContext>> = Lazy::new(ArcSwapOption::empty);
static STATE: AtomicU8 = AtomicU8::new(ContextState::Uninitialized as u8);
static GENERATION: AtomicU64 = AtomicU64::new(0);
// Bumped by each teardown; per-thread state from an earlier epoch is stale.
static EPOCH: AtomicU64 = AtomicU64::new(0);
static INIT_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static INITIALIZE: std::sync::Once = std::sync::Once::new();

pub fn context_state() -> ContextState {
    ContextState::from_u8(STATE.load(Ordering::Acquire))
}

/// Number of contexts torn down so far.
///
/// Per-thread state created before the first context exists stays valid
/// once it is allocated; only a teardown invalidates it.
pub(crate) fn current_epoch() -> u64 {
    EPOCH.load(Ordering::Acquire)
}

/// Return the context, creating it when `allocate` is `true`.
///
/// Concurrent callers racing to allocate all observe the same instance.
/// Allocating after [`destroy_context`] is reported as an error; the new
/// instance is deliberately never reclaimed.
pub fn get_context(allocate: bool) -> Option<Arc<DefaultContext>> {
    if let Some(context) = CONTEXT.load_full() {
        return Some(context);
    }
    if !allocate {
        return None;
    }
    let _guard = INIT_LOCK.lock();
    if let Some(context) = CONTEXT.load_full() {
        return Some(context);
    }
    let generation = GENERATION.load(Ordering::Acquire) + 1;
    let context = Arc::new(DefaultContext::new(generation));
    if context_state() == ContextState::Destroyed {
        error!(
            "Re-initializing default context after it has already been destroyed. \
             The memory will be leaked."
        );
        std::mem::forget(Arc::clone(&context));
    }
    CONTEXT.store(Some(Arc::clone(&context)));
    GENERATION.store(generation, Ordering::Release);
    STATE.store(ContextState::Initialized as u8, Ordering::Release);
    Some(context)
}

/// The context's logger hierarchy, allocating the context if needed.
pub fn default_hierarchy() -> Option<Arc<Hierarchy>> {
    get_context(true).map(|context| Arc::clone(context.hierarchy()))
}

/// Set up the context and register the process hooks. Runs once.
pub fn initialize() {
    INITIALIZE.call_once(|| {
        if let Some(context) = get_context(true) {
            context.reset_time_base();
        }
        register_exit_hook();
        #[cfg(all(unix, feature = "fork-handlers"))]
        install_fork_handlers();
    });
}

/// Flush all appenders, then tear the context down.
///
/// This is what the exit hook runs; call it directly where no exit hook is
/// registered.
pub fn shutdown() {
    at_exit();
    destroy_context();
}

/// Tear down the context. Later allocations are reported as misuse.
pub fn destroy_context() {
    let _guard = INIT_LOCK.lock();
    if let Some(context) = CONTEXT.swap(None) {
        context.hierarchy.shutdown();
    }
    per_thread::thread_cleanup();
    EPOCH.fetch_add(1, Ordering::AcqRel);
    STATE.store(ContextState::Destroyed as u8, Ordering::Release);
}

/// Flush every appender attached to any logger, root included.
pub fn at_exit() {
    let Some(context) = get_context(false) else {
        return;
    };
    let locker = context.hierarchy.lock();
    for logger in locker.all_loggers() {
        let Some(logger) = logger.get() else {
            continue;
        };
        for appender in logger.appenders() {
            if let Some(target) = appender.get() {
                flush_locked(&target);
            }
        }
    }
}

/// Notify fork-aware appenders and flush every output stream.
pub fn prepare_fork() {
    let Some(context) = get_context(false) else {
        return;
    };
    debug!("preparing fork");
    let locker = context.hierarchy.lock();
    for logger in locker.all_loggers() {
        let Some(logger) = logger.get() else {
            continue;
        };
        for appender in logger.appenders() {
            if let Some(target) = appender.get() {
                prepare_fork_locked(&target);
            }
        }
    }
    drop(locker);
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
    flush_c_streams();
    debug!("done preparing fork");
}

#[cfg(unix)]
fn flush_c_streams() {
    // SAFETY: a null stream asks libc to flush every open output stream.
    unsafe {
        libc::fflush(std::ptr::null_mut());
    }
}

#[cfg(not(unix))]
fn flush_c_streams() {}

pub fn after_fork_parent() {
    debug!("after fork in parent");
}

/// Reset the time base and let fork-aware appenders drop the parent's
/// threads.
pub fn after_fork_child() {
    debug!("after fork in child");
    let Some(context) = get_context(false) else {
        return;
    };
    context.reset_time_base();
    let locker = context.hierarchy.lock();
    for logger in locker.all_loggers() {
        let Some(logger) = logger.get() else {
            continue;
        };
        for appender in logger.appenders() {
            if let Some(target) = appender.get() {
                after_fork_child_unlocked(&target);
            }
        }
    }
}

// Unwinding out of an `extern "C"` function aborts the process.
extern "C" fn exit_hook() {
    if std::panic::catch_unwind(shutdown).is_err() {
        error!("logging shutdown panicked during process exit");
    }
}

#[cfg(unix)]
fn register_exit_hook() {
    // SAFETY: `exit_hook` is a plain `extern "C"` function with no captured
    // state.
    if unsafe { libc::atexit(exit_hook) } != 0 {
        error!("failed to register the logging exit hook");
    }
}

#[cfg(not(unix))]
fn register_exit_hook() {
    let _ = exit_hook;
    debug!("no exit hook on this platform; call context::shutdown() before exit");
}

#[cfg(all(unix, feature = "fork-handlers"))]
extern "C" fn prepare_fork_hook() {
    prepare_fork();
}

#[cfg(all(unix, feature = "fork-handlers"))]
extern "C" fn after_fork_parent_hook() {
    after_fork_parent();
}

#[cfg(all(unix, feature = "fork-handlers"))]
extern "C" fn after_fork_child_hook() {
    after_fork_child();
}

/// Register the fork hooks with `pthread_atfork`.
#[cfg(all(unix, feature = "fork-handlers"))]
pub fn install_fork_handlers() {
    // SAFETY: the hooks are `extern "C"` functions without captured state.
    let rc = unsafe {
        libc::pthread_atfork(
            Some(prepare_fork_hook),
            Some(after_fork_parent_hook),
            Some(after_fork_child_hook),
        )
    };
    if rc != 0 {
        error!("pthread_atfork failed with code {rc}");
    }
}
