//! Log record representation shared by loggers, appenders and the wire codec.
//!
//! A [`FemtoLogRecord`] carries the message together with the context the
//! remote collector expects: the nested diagnostic context, the originating
//! thread, the timestamp and the source location.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::context::per_thread;
use crate::level::FemtoLevel;

/// Additional context associated with a log record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Rendered nested diagnostic context at the time of the call.
    pub ndc: String,
    /// Name (or identifier) of the thread that created the record.
    pub thread: String,
    /// Time the record was created.
    pub timestamp: SystemTime,
    /// Source file name for the log call.
    pub filename: String,
    /// Line number in the source file.
    pub line_number: u32,
    /// Function or module path of the call site.
    pub function: String,
}

impl RecordMetadata {
    /// Capture the NDC, thread name and time from the calling thread.
    pub fn capture() -> Self {
        let (ndc, thread) = per_thread::with_per_thread_data(|ptd| {
            (ptd.render_ndc().to_owned(), ptd.thread_name().to_owned())
        })
        .unwrap_or_default();
        Self {
            ndc,
            thread,
            timestamp: SystemTime::now(),
            filename: String::new(),
            line_number: 0,
            function: String::new(),
        }
    }

    /// Seconds and microseconds since the Unix epoch, as sent on the wire.
    pub fn epoch_parts(&self) -> (u32, u32) {
        let since = self
            .timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let secs = u32::try_from(since.as_secs()).unwrap_or(u32::MAX);
        (secs, since.subsec_micros())
    }

    /// Rebuild a timestamp from wire seconds and microseconds.
    pub fn timestamp_from_parts(secs: u32, micros: u32) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(u64::from(secs)) + Duration::from_micros(u64::from(micros))
    }
}

impl Default for RecordMetadata {
    fn default() -> Self {
        Self {
            ndc: String::new(),
            thread: String::new(),
            timestamp: UNIX_EPOCH,
            filename: String::new(),
            line_number: 0,
            function: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FemtoLogRecord {
    /// Name of the logger that created this record.
    pub logger: String,
    /// Severity of the record.
    pub level: FemtoLevel,
    /// The log message content.
    pub message: String,
    /// Contextual metadata for the record.
    pub metadata: RecordMetadata,
}

impl FemtoLogRecord {
    /// Construct a new log record, capturing context from the calling thread.
    pub fn new(logger: &str, level: FemtoLevel, message: &str) -> Self {
        Self::with_metadata(logger, level, message, RecordMetadata::capture())
    }

    /// Construct a log record with explicit metadata.
    pub fn with_metadata(
        logger: &str,
        level: FemtoLevel,
        message: &str,
        metadata: RecordMetadata,
    ) -> Self {
        Self {
            logger: logger.to_owned(),
            level,
            message: message.to_owned(),
            metadata,
        }
    }

    /// Attach the call-site location.
    pub fn at(mut self, filename: &str, line_number: u32, function: &str) -> Self {
        self.metadata.filename = filename.to_owned();
        self.metadata.line_number = line_number;
        self.metadata.function = function.to_owned();
        self
    }

    pub fn logger(&self) -> &str {
        &self.logger
    }

    pub fn level(&self) -> FemtoLevel {
        self.level
    }

    pub fn level_str(&self) -> &'static str {
        self.level.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for FemtoLogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_parts_round_trip_to_microseconds() {
        let metadata = RecordMetadata {
            timestamp: UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789),
            ..RecordMetadata::default()
        };
        let (secs, micros) = metadata.epoch_parts();
        assert_eq!((secs, micros), (1_700_000_000, 123_456));
        assert_eq!(
            RecordMetadata::timestamp_from_parts(secs, micros),
            UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_000)
        );
    }

    #[test]
    fn new_record_captures_calling_thread() {
        let handle = std::thread::Builder::new()
            .name("record-capture".into())
            .spawn(|| FemtoLogRecord::new("core", FemtoLevel::Warn, "msg"))
            .expect("spawn thread");
        let record = handle.join().expect("join thread");
        assert_eq!(record.metadata.thread, "record-capture");
        assert_eq!(record.to_string(), "WARN - msg");
    }
}
