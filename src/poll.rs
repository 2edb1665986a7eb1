//! Bounded re-reads of remote state.
//!
//! The remote index lags behind writes, so flows that need to see the effect
//! of a write (a created game becoming initialised, a game switching to
//! ongoing) re-read until a predicate holds. Continuous view refreshes use
//! [`Backoff`] instead.

use crate::remote::RemoteResult;
use std::time::Duration;
use tokio::time::{
    self,
    Instant,
};
use tracing::{
    debug,
    warn,
};

pub const CREATION_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const CREATION_POLL_ATTEMPTS: u32 = 45;
pub const STATUS_POLL_ATTEMPTS: u32 = 30;
pub const QUICK_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const QUICK_POLL_ATTEMPTS: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Optional wall-clock ceiling; polling stops rather than sleep past it.
    pub budget: Option<Duration>,
}

impl PollConfig {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            budget: None,
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn quick() -> Self {
        Self::new(QUICK_POLL_INTERVAL, QUICK_POLL_ATTEMPTS)
    }

    pub fn creation() -> Self {
        Self::new(CREATION_POLL_INTERVAL, CREATION_POLL_ATTEMPTS)
    }

    pub fn status() -> Self {
        Self::new(CREATION_POLL_INTERVAL, STATUS_POLL_ATTEMPTS)
    }
}

/// Result of a poll: the confirming value, or `None` with the number of reads
/// spent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollOutcome<T> {
    pub value: Option<T>,
    pub attempts: u32,
}

impl<T> PollOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        self.value
    }
}

/// Reads with `fetch` until `done` accepts the value or the budget runs out.
///
/// Read errors are logged and count as an attempt. The first accepted value is
/// returned without sleeping again, and no sleep follows the final attempt.
pub async fn poll_until<T, F, Fut, P>(
    config: PollConfig,
    label: &str,
    mut fetch: F,
    mut done: P,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RemoteResult<T>>,
    P: FnMut(&T) -> bool,
{
    let started = Instant::now();
    let mut attempts = 0;
    while attempts < config.max_attempts {
        attempts += 1;
        match fetch().await {
            Ok(value) if done(&value) => {
                debug!(label, attempts, "poll confirmed");
                return PollOutcome {
                    value: Some(value),
                    attempts,
                };
            }
            Ok(_) => debug!(label, attempts, "poll condition not met yet"),
            Err(err) => warn!(label, attempts, error = %err, "poll read failed"),
        }
        if attempts == config.max_attempts {
            break;
        }
        if let Some(budget) = config.budget
            && started.elapsed() + config.interval > budget
        {
            debug!(label, attempts, "poll budget exhausted");
            break;
        }
        time::sleep(config.interval).await;
    }
    warn!(label, attempts, "poll gave up without confirmation");
    PollOutcome {
        value: None,
        attempts,
    }
}

pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(3);
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);
const BACKOFF_FACTOR: f64 = 1.5;

/// Interval for continuous refreshes: grows by 1.5x per failure up to `max`,
/// back to `base` on the next success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn on_failure(&mut self) -> Duration {
        self.current = self.current.mul_f64(BACKOFF_FACTOR).min(self.max);
        self.current
    }

    pub fn on_success(&mut self) -> Duration {
        self.current = self.base;
        self.current
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::remote::RemoteError;
    use proptest::prelude::*;
    use std::sync::atomic::{
        AtomicU32,
        Ordering,
    };

    #[tokio::test(start_paused = true)]
    async fn poll_until__returns_first_value_accepted_by_predicate() {
        // given
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let config = PollConfig::new(Duration::from_secs(2), 10);

        // when
        let outcome = poll_until(
            config,
            "counter",
            || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok::<_, RemoteError>(n)
            },
            |n| *n >= 3,
        )
        .await;

        // then
        assert_eq!(outcome.value, Some(3));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until__treats_read_errors_as_spent_attempts() {
        // given
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let config = PollConfig::new(Duration::from_millis(500), 4);

        // when
        let outcome = poll_until(
            config,
            "flaky",
            || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(RemoteError::new("index not ready"))
                } else {
                    Ok(n)
                }
            },
            |_| true,
        )
        .await;

        // then
        assert_eq!(outcome.value, Some(3));
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until__stops_at_wall_clock_budget() {
        // given
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let config = PollConfig::new(Duration::from_secs(2), 100)
            .with_budget(Duration::from_secs(7));

        // when
        let outcome = poll_until(
            config,
            "never",
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, RemoteError>(false)
            },
            |ready| *ready,
        )
        .await;

        // then: reads at 0s, 2s, 4s, 6s; a fifth would need to sleep to 8s
        assert_eq!(outcome.value, None);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn backoff__grows_caps_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(5));
        assert_eq!(backoff.on_failure(), Duration::from_secs(3));
        assert_eq!(backoff.on_failure(), Duration::from_millis(4500));
        assert_eq!(backoff.on_failure(), Duration::from_secs(5));
        assert_eq!(backoff.on_failure(), Duration::from_secs(5));
        assert_eq!(backoff.on_success(), Duration::from_secs(2));
    }

    proptest! {
        #[test]
        fn backoff__never_exceeds_cap(
            base_ms in 1u64..5_000,
            extra_ms in 0u64..60_000,
            failures in 0usize..40,
        ) {
            let base = Duration::from_millis(base_ms);
            let max = Duration::from_millis(base_ms + extra_ms);
            let mut backoff = Backoff::new(base, max);
            for _ in 0..failures {
                let next = backoff.on_failure();
                prop_assert!(next <= max);
                prop_assert!(next >= base);
            }
        }
    }
}
