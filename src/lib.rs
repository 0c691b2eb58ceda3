//! Core of the femtologging runtime: shared handles, the wire codec, the
//! socket layer and the process-wide logging context.
//!
//! Records produced by [`FemtoLogger`]s flow through appenders. The
//! [`FemtoSocketAppender`] encodes them with [`record_codec`] into a
//! [`WireBuffer`] and ships them over a [`TransportChannel`] to a
//! [`CollectorServer`]. The [`context`] module owns the single
//! [`DefaultContext`] and the exit and fork hooks that flush every appender.

pub mod appender;
pub mod collector;
pub mod context;
pub mod filter;
pub mod formatter;
pub mod hierarchy;
pub mod level;
pub mod log_record;
pub mod logger;
pub mod ndc;
pub mod net;
pub mod null_appender;
pub mod rate_limited_warner;
pub mod record_codec;
pub mod shared_object;
pub mod socket_appender;
pub mod spi;
pub mod string_param;
pub mod wire_buffer;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use appender::{AppenderError, FemtoAppender, ForkHandler, SharedAppenderPtr, shared_appender};
pub use collector::{CollectError, CollectorServer, read_record};
pub use context::{
    ContextState, DefaultContext, context_state, default_hierarchy, destroy_context, get_context,
    initialize, shutdown,
};
pub use formatter::{DefaultFormatter, FemtoFormatter, SharedFormatter};
pub use hierarchy::{Hierarchy, LoggerNameError};
pub use level::FemtoLevel;
pub use log_record::{FemtoLogRecord, RecordMetadata};
pub use logger::FemtoLogger;
pub use net::{ListeningChannel, NetError, TransportChannel, TransportError};
pub use null_appender::NullAppender;
pub use record_codec::{DecodedRecord, MAX_MESSAGE_SIZE, MESSAGE_VERSION};
pub use shared_object::{Handle, SharedObject};
pub use socket_appender::{
    AppenderBuildError, BackoffPolicy, FemtoSocketAppender, SocketAppenderBuilder,
    SocketAppenderConfig,
};
pub use string_param::{CharWidth, TextParam};
pub use wire_buffer::{BufferError, WireBuffer};
