//! Configuration consumed by the socket appender.
//!
//! [`SocketAppenderBuilder`](super::SocketAppenderBuilder) validates these
//! values before [`FemtoSocketAppender`](super::FemtoSocketAppender) hands
//! them to its worker thread.

use std::time::Duration;

use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

/// Default bounded queue capacity between callers and the worker.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
/// Port collectors listen on unless told otherwise.
pub const DEFAULT_PORT: u16 = 9998;
/// Send/receive timeout applied to the connected socket; also bounds how
/// long `flush` waits for the worker.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(1);
/// Default base delay for exponential backoff retries.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);
/// Default maximum delay for exponential backoff retries.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(10);
/// Default duration of healthy writes that resets backoff state.
pub const DEFAULT_BACKOFF_RESET: Duration = Duration::from_secs(30);
/// Default absolute deadline for reconnection attempts.
pub const DEFAULT_BACKOFF_DEADLINE: Duration = Duration::from_secs(120);
/// Name given to appenders built without one.
pub const DEFAULT_APPENDER_NAME: &str = "socket";

/// Everything the worker needs to reach a collector.
#[derive(Clone, Debug)]
pub struct SocketAppenderConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Sender identity written into every record.
    pub server_name: String,
    pub capacity: usize,
    pub io_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub warn_interval: Duration,
}

impl Default for SocketAppenderConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_APPENDER_NAME.into(),
            host: "localhost".into(),
            port: DEFAULT_PORT,
            server_name: String::new(),
            capacity: DEFAULT_CHANNEL_CAPACITY,
            io_timeout: DEFAULT_IO_TIMEOUT,
            backoff: BackoffPolicy::default(),
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl SocketAppenderConfig {
    /// Point the configuration at `host:port`.
    pub fn with_target(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }
}

/// Exponential backoff policy for reconnection attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub reset_after: Duration,
    pub deadline: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            cap: DEFAULT_BACKOFF_CAP,
            reset_after: DEFAULT_BACKOFF_RESET,
            deadline: DEFAULT_BACKOFF_DEADLINE,
        }
    }
}
