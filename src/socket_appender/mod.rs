//! Remote appender shipping records to a collector over TCP.
//!
//! [`FemtoSocketAppender`] encodes each record with
//! [`record_codec`](crate::record_codec) on the calling thread and queues the
//! frame for a worker thread. The worker owns a
//! [`TransportChannel`](crate::net::TransportChannel), connects lazily,
//! closes the channel on any write failure and reconnects on the next frame
//! using jittered exponential backoff.

mod appender;
pub(crate) mod backoff;
mod builder;
mod config;
mod worker;


pub use appender::FemtoSocketAppender;
pub use builder::{AppenderBuildError, SocketAppenderBuilder, SocketAppenderFactory};
pub use config::{
    BackoffPolicy, DEFAULT_APPENDER_NAME, DEFAULT_CHANNEL_CAPACITY, DEFAULT_IO_TIMEOUT,
    DEFAULT_PORT, SocketAppenderConfig,
};
