//! Throttled reporting of dropped records.
//!
//! Appenders that shed load (full queues, unreachable collectors) count each
//! drop and report the total at most once per interval, so a collector outage
//! produces a trickle of diagnostics instead of one per record.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// How often to emit warnings about dropped log records by default.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

static CLOCK_ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

// Monotonic milliseconds, offset by one so zero can mean "never warned".
fn ticks() -> u64 {
    u64::try_from(CLOCK_ORIGIN.elapsed().as_millis())
        .unwrap_or(u64::MAX - 1)
        .saturating_add(1)
}

/// Drop counter with a rate-limited reporting callback.
///
/// [`record_drop`](Self::record_drop) is lock-free and safe to call from any
/// thread. The first call to [`warn_if_due`](Self::warn_if_due) reports
/// immediately; later ones only once `interval` has passed since the last
/// report. [`flush`](Self::flush) reports whatever is pending regardless.
pub struct RateLimitedWarner {
    interval_ms: u64,
    last_warn: AtomicU64,
    dropped: AtomicU64,
}

impl RateLimitedWarner {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            last_warn: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records dropped since the last report.
    pub fn pending(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Report pending drops through `warn` if the interval has elapsed.
    pub fn warn_if_due(&self, warn: impl FnOnce(u64)) {
        let now = ticks();
        let prev = self.last_warn.load(Ordering::Relaxed);
        if prev != 0 && now.saturating_sub(prev) < self.interval_ms {
            return;
        }
        // Only the thread that wins the swap reports for this window.
        if self
            .last_warn
            .compare_exchange(prev, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let count = self.dropped.swap(0, Ordering::Relaxed);
        if count > 0 {
            warn(count);
        }
    }

    /// Report pending drops now.
    pub fn flush(&self, warn: impl FnOnce(u64)) {
        let count = self.dropped.swap(0, Ordering::Relaxed);
        if count > 0 {
            self.last_warn.store(ticks(), Ordering::Relaxed);
            warn(count);
        }
    }
}

impl Default for RateLimitedWarner {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_INTERVAL)
    }
}

impl std::fmt::Debug for RateLimitedWarner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedWarner")
            .field("interval_ms", &self.interval_ms)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn first_drop_is_reported_immediately() {
        let warner = RateLimitedWarner::default();
        warner.record_drop();
        let mut reported = None;
        warner.warn_if_due(|count| reported = Some(count));
        assert_eq!(reported, Some(1));
        assert_eq!(warner.pending(), 0);
    }

    #[rstest]
    fn later_drops_wait_for_the_interval() {
        let warner = RateLimitedWarner::new(Duration::from_secs(60));
        warner.record_drop();
        warner.warn_if_due(|_| {});
        warner.record_drop();
        warner.record_drop();
        let mut reported = None;
        warner.warn_if_due(|count| reported = Some(count));
        assert_eq!(reported, None);
        assert_eq!(warner.pending(), 2);
        warner.flush(|count| reported = Some(count));
        assert_eq!(reported, Some(2));
    }

    #[rstest]
    fn flush_without_drops_is_silent() {
        let warner = RateLimitedWarner::default();
        let mut called = false;
        warner.flush(|_| called = true);
        assert!(!called);
    }

    #[rstest]
    fn zero_interval_never_suppresses() {
        let warner = RateLimitedWarner::new(Duration::ZERO);
        let mut warnings = Vec::new();
        for _ in 0..3 {
            warner.record_drop();
            warner.warn_if_due(|count| warnings.push(count));
        }
        assert_eq!(warnings, vec![1, 1, 1]);
    }
}
