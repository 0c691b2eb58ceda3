//! Appender that formats records and discards the output.
//!
//! Writes go to the calling thread's handle on the platform null device, so
//! the full formatting and I/O path runs without producing output. Useful as
//! a benchmark baseline and as a placeholder in configuration.

use std::any::Any;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::appender::{AppenderError, FemtoAppender, SharedAppenderPtr, shared_appender};
use crate::context::per_thread::with_per_thread_data;
use crate::formatter::SharedFormatter;
use crate::log_record::FemtoLogRecord;
use crate::spi::{Factory, FactoryError, Properties};

/// Default name given to appenders built without one.
pub const DEFAULT_NULL_APPENDER_NAME: &str = "null";

#[derive(Debug)]
pub struct NullAppender {
    name: String,
    formatter: SharedFormatter,
    closed: AtomicBool,
}

impl NullAppender {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_formatter(name, SharedFormatter::default())
    }

    pub fn with_formatter(name: impl Into<String>, formatter: SharedFormatter) -> Self {
        Self {
            name: name.into(),
            formatter,
            closed: AtomicBool::new(false),
        }
    }
}

impl FemtoAppender for NullAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, record: &FemtoLogRecord) -> Result<(), AppenderError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AppenderError::Closed);
        }
        let line = self.formatter.format(record);
        with_per_thread_data(|ptd| {
            let sink = ptd.null_sink()?;
            sink.write_all(line.as_bytes())?;
            sink.write_all(b"\n")
        })
        .unwrap_or(Ok(()))
        .map_err(|err| AppenderError::Io(err.to_string()))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builds [`NullAppender`]s; accepts an optional `name` property.
pub struct NullAppenderFactory;

impl Factory for NullAppenderFactory {
    type Product = SharedAppenderPtr;

    fn type_name(&self) -> &str {
        "NullAppender"
    }

    fn create(&self, properties: &Properties) -> Result<SharedAppenderPtr, FactoryError> {
        let name = properties
            .get("name")
            .map_or(DEFAULT_NULL_APPENDER_NAME, String::as_str);
        Ok(shared_appender(NullAppender::new(name)))
    }
}
