//! Record layouts.
//!
//! Provides the core [`FemtoFormatter`] trait alongside a shared, cheaply
//! cloned wrapper used by appenders and the layout factory registry.

use std::{fmt, sync::Arc};

use crate::log_record::FemtoLogRecord;

/// Trait for formatting log records into strings.
///
/// Implementors must be thread-safe (`Send + Sync`) so formatters can be
/// shared across threads in a logging system.
pub trait FemtoFormatter: Send + Sync {
    /// Format a log record into a string representation.
    fn format(&self, record: &FemtoLogRecord) -> String;
}

/// Shared formatter trait object used across appenders.
#[derive(Clone)]
pub struct SharedFormatter {
    inner: Arc<dyn FemtoFormatter>,
}

impl SharedFormatter {
    /// Create a shared formatter from an owned formatter implementation.
    pub fn new<F>(formatter: F) -> Self
    where
        F: FemtoFormatter + 'static,
    {
        Self {
            inner: Arc::new(formatter),
        }
    }

    /// Format a log record using the wrapped formatter instance.
    pub fn format(&self, record: &FemtoLogRecord) -> String {
        self.inner.format(record)
    }
}

impl Default for SharedFormatter {
    fn default() -> Self {
        Self::new(DefaultFormatter)
    }
}

impl fmt::Debug for SharedFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedFormatter(<dyn FemtoFormatter>)")
    }
}

/// `logger [LEVEL] <ndc> message`, omitting the NDC when empty.
#[derive(Copy, Clone, Debug)]
pub struct DefaultFormatter;

impl FemtoFormatter for DefaultFormatter {
    fn format(&self, record: &FemtoLogRecord) -> String {
        let ndc = &record.metadata.ndc;
        if ndc.is_empty() {
            format!(
                "{} [{}] {}",
                record.logger(),
                record.level_str(),
                record.message()
            )
        } else {
            format!(
                "{} [{}] <{ndc}> {}",
                record.logger(),
                record.level_str(),
                record.message()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::FemtoLevel;
    use crate::log_record::RecordMetadata;
    use static_assertions::assert_impl_all;

    #[test]
    fn shared_formatter_is_send_sync() {
        assert_impl_all!(SharedFormatter: Send, Sync);
    }

    #[test]
    fn default_formatter_includes_ndc() {
        let metadata = RecordMetadata {
            ndc: "req=1".into(),
            ..RecordMetadata::default()
        };
        let record = FemtoLogRecord::with_metadata("app", FemtoLevel::Info, "hi", metadata);
        assert_eq!(DefaultFormatter.format(&record), "app [INFO] <req=1> hi");
        let bare = FemtoLogRecord::with_metadata(
            "app",
            FemtoLevel::Info,
            "hi",
            RecordMetadata::default(),
        );
        assert_eq!(SharedFormatter::default().format(&bare), "app [INFO] hi");
    }
}
