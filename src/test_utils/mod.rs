//! Test-only helpers shared across crate unit and integration tests.
//!
//! Compiled for unit tests and, through the `test-util` feature, for the
//! integration tests under `tests/`.

pub mod collecting_appender;

pub use collecting_appender::CollectingAppender;
