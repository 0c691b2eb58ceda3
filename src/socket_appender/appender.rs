//! Public appender type forwarding encoded records to a collector.

use std::any::Any;
use std::fmt;
use std::mem;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use log::{debug, warn};
use parking_lot::Mutex;

use crate::appender::{AppenderError, FemtoAppender, ForkHandler};
use crate::context::per_thread::with_per_thread_data;
use crate::log_record::FemtoLogRecord;
use crate::rate_limited_warner::RateLimitedWarner;
use crate::record_codec::{MAX_PAYLOAD_SIZE, frame_record};
use crate::wire_buffer::{BufferError, WireBuffer};

use super::config::SocketAppenderConfig;
use super::worker::{SocketCommand, enqueue_frame, flush_queue, request_shutdown, spawn_worker};

/// Appender sending each record as one length-prefixed frame over TCP.
///
/// Records are encoded on the calling thread and handed to a worker that
/// owns the connection, so `append` never blocks on the network.
///
/// In a forked child the inherited worker is abandoned and a new one is
/// started by the first record appended there.
pub struct FemtoSocketAppender {
    name: String,
    server_name: String,
    config: SocketAppenderConfig,
    tx: Mutex<Option<Sender<SocketCommand>>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    respawn: AtomicBool,
    // Process that spawned the current worker.
    worker_pid: AtomicU32,
    warner: RateLimitedWarner,
    io_timeout: Duration,
}

impl FemtoSocketAppender {
    /// Start an appender for `host:port` with default settings.
    pub fn connect(host: &str, port: u16) -> std::io::Result<Self> {
        Self::with_config(SocketAppenderConfig::default().with_target(host, port))
    }

    /// Start the worker described by `config`.
    pub fn with_config(config: SocketAppenderConfig) -> std::io::Result<Self> {
        let name = config.name.clone();
        let server_name = config.server_name.clone();
        let io_timeout = config.io_timeout;
        let warner = RateLimitedWarner::new(config.warn_interval);
        let (tx, handle) = spawn_worker(config.clone())?;
        Ok(Self {
            name,
            server_name,
            config,
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            respawn: AtomicBool::new(false),
            worker_pid: AtomicU32::new(process::id()),
            warner,
            io_timeout,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// The worker queue, restarting an abandoned worker when `restart` is set.
    fn sender(&self, restart: bool) -> Option<Sender<SocketCommand>> {
        let mut tx = self.tx.lock();
        if self.inherited_worker() {
            self.abandon_worker(&mut tx, &mut self.handle.lock());
        }
        if restart && tx.is_none() && self.respawn.swap(false, Ordering::AcqRel) {
            match spawn_worker(self.config.clone()) {
                Ok((sender, handle)) => {
                    debug!("FemtoSocketAppender {} restarted its worker", self.name);
                    *tx = Some(sender);
                    *self.handle.lock() = Some(handle);
                    self.worker_pid.store(process::id(), Ordering::Release);
                }
                Err(err) => warn!("FemtoSocketAppender could not restart worker: {err}"),
            }
        }
        tx.clone()
    }

    /// `true` while the appender holds a worker queue.
    pub fn is_running(&self) -> bool {
        self.tx.lock().is_some()
    }

    /// The worker was started by another process, i.e. before a fork.
    fn inherited_worker(&self) -> bool {
        self.worker_pid.load(Ordering::Acquire) != process::id()
    }

    // The thread behind these does not exist in this process; joining it or
    // waiting for its acknowledgement would never finish.
    fn abandon_worker(
        &self,
        tx: &mut Option<Sender<SocketCommand>>,
        handle: &mut Option<thread::JoinHandle<()>>,
    ) {
        if let Some(sender) = tx.take() {
            mem::forget(sender);
            self.respawn.store(true, Ordering::Release);
        }
        if let Some(worker) = handle.take() {
            mem::forget(worker);
        }
        self.worker_pid.store(process::id(), Ordering::Release);
    }

    fn encode(&self, record: &FemtoLogRecord) -> Result<Vec<u8>, BufferError> {
        with_per_thread_data(|ptd| {
            frame_record(ptd.encode_buffer(MAX_PAYLOAD_SIZE), record, &self.server_name)
        })
        .unwrap_or_else(|| {
            // No per-thread scratch during thread teardown or re-entrant calls.
            let mut scratch = WireBuffer::with_capacity(MAX_PAYLOAD_SIZE);
            frame_record(&mut scratch, record, &self.server_name)
        })
    }

    fn join_worker(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            warn!("FemtoSocketAppender: worker thread panicked");
        }
    }
}

impl FemtoAppender for FemtoSocketAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, record: &FemtoLogRecord) -> Result<(), AppenderError> {
        let Some(tx) = self.sender(true) else {
            self.warner.record_drop();
            self.warner.warn_if_due(|count| {
                warn!("FemtoSocketAppender dropped {count} records after close");
            });
            return Err(AppenderError::Closed);
        };
        let frame = self.encode(record)?;
        enqueue_frame(&tx, frame, &self.warner)
    }

    fn flush(&self) -> bool {
        let Some(tx) = self.sender(false) else {
            return false;
        };
        self.warner.flush(|count| {
            warn!("FemtoSocketAppender dropped {count} records in the last interval");
        });
        flush_queue(&tx, self.io_timeout)
    }

    fn close(&self) {
        let mut slot = self.tx.lock();
        if self.inherited_worker() {
            self.abandon_worker(&mut slot, &mut self.handle.lock());
        }
        self.respawn.store(false, Ordering::Release);
        let Some(tx) = slot.take() else {
            return;
        };
        drop(slot);
        if !request_shutdown(&tx, self.io_timeout) {
            warn!("FemtoSocketAppender: worker did not acknowledge shutdown");
        }
        drop(tx);
        self.join_worker();
    }

    fn as_fork_handler(&self) -> Option<&dyn ForkHandler> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ForkHandler for FemtoSocketAppender {
    /// Drain the queue so the child does not inherit half-sent frames.
    fn prepare_fork(&self) {
        self.flush();
    }

    /// Abandon the parent's worker; the next append starts a fresh one.
    ///
    /// If a parent thread held one of the locks at fork time the worker is
    /// left in place and abandoned on the next append or close instead.
    fn after_fork_child(&self) {
        let (Some(mut tx), Some(mut handle)) = (self.tx.try_lock(), self.handle.try_lock())
        else {
            return;
        };
        self.abandon_worker(&mut tx, &mut handle);
    }
}

impl Drop for FemtoSocketAppender {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for FemtoSocketAppender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FemtoSocketAppender")
            .field("name", &self.name)
            .field("server_name", &self.server_name)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}
