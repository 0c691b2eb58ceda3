//! Reconnection pacing for the socket worker.
//!
//! Failures grow the delay exponentially up to the policy cap, with random
//! jitter so many processes restarting against one collector do not retry in
//! lockstep. Once the failure streak outlives the policy deadline the worker
//! stops sleeping and simply drops frames until a connect succeeds.

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::config::BackoffPolicy;

/// Smallest delay handed out after a failure.
const MIN_SLEEP_MS: u64 = 10;

pub struct BackoffState {
    policy: BackoffPolicy,
    current: Duration,
    failing_since: Option<Instant>,
    last_success: Option<Instant>,
    rng: StdRng,
}

impl BackoffState {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.base,
            failing_since: None,
            last_success: None,
            rng: StdRng::from_entropy(),
            policy,
        }
    }

    /// `true` while a failure streak is in progress.
    pub fn is_failing(&self) -> bool {
        self.failing_since.is_some()
    }

    /// Note a successful connect or write.
    ///
    /// A streak that has lasted at least `reset_after` is forgotten, so the
    /// next failure starts again from the base delay.
    pub fn record_success(&mut self, now: Instant) {
        if let Some(start) = self.failing_since
            && now.duration_since(start) >= self.policy.reset_after
        {
            self.reset();
        }
        self.last_success = Some(now);
    }

    /// Forget the streak after `reset_after` of uninterrupted success.
    pub fn reset_after_idle(&mut self, now: Instant) {
        if let Some(success) = self.last_success
            && now.duration_since(success) >= self.policy.reset_after
        {
            self.reset();
        }
    }

    /// Delay to wait after a failure at `now`, or `None` once the streak has
    /// outlived the deadline.
    pub fn next_sleep(&mut self, now: Instant) -> Option<Duration> {
        let start = *self.failing_since.get_or_insert(now);
        if now.duration_since(start) >= self.policy.deadline {
            return None;
        }
        if now != start {
            self.current = self.current.saturating_mul(2).min(self.policy.cap);
        }
        let max_ms = u64::try_from(self.current.as_millis()).unwrap_or(u64::MAX);
        let sleep_ms = match max_ms {
            0 => MIN_SLEEP_MS,
            1..=MIN_SLEEP_MS => max_ms,
            _ => self.rng.gen_range(MIN_SLEEP_MS..=max_ms),
        };
        Some(Duration::from_millis(sleep_ms))
    }

    fn reset(&mut self) {
        self.current = self.policy.base;
        self.failing_since = None;
        self.last_success = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(100),
            cap: Duration::from_millis(400),
            reset_after: Duration::from_secs(5),
            deadline: Duration::from_secs(60),
        }
    }

    #[rstest]
    fn delays_stay_within_cap(policy: BackoffPolicy) {
        let mut state = BackoffState::new(policy);
        let start = Instant::now();
        for step in 0..8 {
            let delay = state
                .next_sleep(start + Duration::from_millis(step))
                .expect("within deadline");
            assert!(delay >= Duration::from_millis(MIN_SLEEP_MS));
            assert!(delay <= Duration::from_millis(400));
        }
        assert!(state.is_failing());
    }

    #[rstest]
    fn gives_up_after_deadline(policy: BackoffPolicy) {
        let mut state = BackoffState::new(policy);
        let start = Instant::now();
        assert!(state.next_sleep(start).is_some());
        assert_eq!(state.next_sleep(start + Duration::from_secs(61)), None);
    }

    #[rstest]
    fn long_streak_resets_on_success(policy: BackoffPolicy) {
        let mut state = BackoffState::new(policy);
        let start = Instant::now();
        state.next_sleep(start);
        state.record_success(start + Duration::from_secs(1));
        assert!(state.is_failing());
        state.record_success(start + Duration::from_secs(6));
        assert!(!state.is_failing());
    }

    #[rstest]
    fn small_base_is_used_without_jitter() {
        let mut state = BackoffState::new(BackoffPolicy {
            base: Duration::from_millis(3),
            ..BackoffPolicy::default()
        });
        assert_eq!(
            state.next_sleep(Instant::now()),
            Some(Duration::from_millis(3))
        );
    }
}
