//! Worker thread owning the connection to the collector.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, warn};

use crate::appender::AppenderError;
use crate::net::TransportChannel;
use crate::rate_limited_warner::RateLimitedWarner;

use super::backoff::BackoffState;
use super::config::SocketAppenderConfig;

/// Commands processed by the worker thread.
#[derive(Debug)]
pub enum SocketCommand {
    /// A length-prefixed record ready to write.
    Frame(Vec<u8>),
    /// Reply with whether the connection is currently up.
    Flush(Sender<bool>),
    Shutdown(Sender<()>),
}

pub fn spawn_worker(
    config: SocketAppenderConfig,
) -> std::io::Result<(Sender<SocketCommand>, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded(config.capacity);
    let handle = thread::Builder::new()
        .name(format!("femto-socket-{}", config.name))
        .spawn(move || Worker::new(config).run(rx))?;
    Ok((tx, handle))
}

struct Worker {
    config: SocketAppenderConfig,
    channel: TransportChannel,
    backoff: BackoffState,
    warner: RateLimitedWarner,
}

impl Worker {
    fn new(config: SocketAppenderConfig) -> Self {
        Self {
            channel: TransportChannel::new(),
            backoff: BackoffState::new(config.backoff.clone()),
            warner: RateLimitedWarner::new(config.warn_interval),
            config,
        }
    }

    fn run(mut self, rx: Receiver<SocketCommand>) {
        while let Ok(cmd) = rx.recv() {
            match cmd {
                SocketCommand::Frame(frame) => self.send(&frame),
                SocketCommand::Flush(ack) => {
                    let connected = self.channel.is_open();
                    let _ = ack.send(connected);
                }
                SocketCommand::Shutdown(ack) => {
                    self.channel.close();
                    let _ = ack.send(());
                    break;
                }
            }
        }
        self.warner.flush(|count| {
            warn!("FemtoSocketAppender dropped {count} records before shutdown");
        });
        debug!("FemtoSocketAppender worker for {} exiting", self.config.name);
    }

    fn send(&mut self, frame: &[u8]) {
        let now = Instant::now();
        if !self.channel.is_open() && !self.connect(now) {
            self.drop_frame("no connection to collector");
            return;
        }
        match self.channel.write_bytes(frame) {
            Ok(()) => {
                self.backoff.record_success(now);
                self.backoff.reset_after_idle(now);
            }
            Err(err) => {
                warn!(
                    "FemtoSocketAppender write to {}:{} failed: {err}",
                    self.config.host, self.config.port
                );
                self.channel.close();
                self.drop_frame("write errors");
                self.pause(now);
            }
        }
    }

    fn connect(&mut self, now: Instant) -> bool {
        let (host, port) = (self.config.host.as_str(), self.config.port);
        match self.channel.connect(host, port) {
            Ok(()) => {
                if let Err(err) = self.channel.set_io_timeout(Some(self.config.io_timeout)) {
                    warn!("FemtoSocketAppender could not set socket timeout: {err}");
                }
                if self.backoff.is_failing() {
                    debug!("FemtoSocketAppender reconnected to {host}:{port}");
                } else {
                    debug!("FemtoSocketAppender connected to {host}:{port}");
                }
                self.backoff.record_success(now);
                true
            }
            Err(err) => {
                warn!("FemtoSocketAppender failed to connect to {host}:{port}: {err}");
                self.pause(now);
                false
            }
        }
    }

    fn pause(&mut self, now: Instant) {
        if let Some(delay) = self.backoff.next_sleep(now) {
            thread::sleep(delay);
        }
    }

    fn drop_frame(&self, reason: &str) {
        self.warner.record_drop();
        self.warner.warn_if_due(|count| {
            warn!("FemtoSocketAppender dropped {count} records; {reason}");
        });
    }
}

/// Queue `frame` without blocking the caller.
pub fn enqueue_frame(
    tx: &Sender<SocketCommand>,
    frame: Vec<u8>,
    warner: &RateLimitedWarner,
) -> Result<(), AppenderError> {
    match tx.try_send(SocketCommand::Frame(frame)) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => {
            warner.record_drop();
            warner.warn_if_due(|count| {
                warn!("FemtoSocketAppender queue full; dropped {count} records");
            });
            Err(AppenderError::QueueFull)
        }
        Err(TrySendError::Disconnected(_)) => {
            warner.record_drop();
            warner.warn_if_due(|count| {
                warn!("FemtoSocketAppender worker gone; dropped {count} records");
            });
            Err(AppenderError::Closed)
        }
    }
}

/// Wait until the worker has processed everything queued before this call.
///
/// Returns `true` when the worker answered in time with a live connection.
pub fn flush_queue(tx: &Sender<SocketCommand>, timeout: Duration) -> bool {
    let (ack_tx, ack_rx) = bounded(1);
    if tx.send_timeout(SocketCommand::Flush(ack_tx), timeout).is_err() {
        return false;
    }
    ack_rx.recv_timeout(timeout).unwrap_or(false)
}

/// Ask the worker to close its connection and exit.
pub fn request_shutdown(tx: &Sender<SocketCommand>, timeout: Duration) -> bool {
    let (ack_tx, ack_rx) = bounded(1);
    if tx.send_timeout(SocketCommand::Shutdown(ack_tx), timeout).is_err() {
        return false;
    }
    ack_rx.recv_timeout(timeout).is_ok()
}
