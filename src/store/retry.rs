//! Reconnection Policy
//!
//! Pure decision logic for how long to wait before redialing the store and
//! when to give up for good. Kept free of I/O so it can be tested directly.

use std::time::Duration;

// == Failure Kind ==
/// Classification of a failed dial, as far as the policy cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The store actively refused the connection
    Refused,
    /// The connection was force-closed
    Closed,
    /// Anything else that may clear up on its own
    Transient,
}

// == Decision ==
/// What the supervisor should do after a failed dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Sleep for the given delay, then dial again
    RetryAfter(Duration),
    /// Stop reconnecting permanently
    Exhausted,
}

// == Retry Policy ==
/// Tunable constants of the reconnection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed delay after a refused or force-closed connection
    pub refused_delay: Duration,
    /// Per-attempt increment for transient failures
    pub step: Duration,
    /// Upper bound for the transient delay
    pub max_delay: Duration,
    /// Give up once the cumulative retry time exceeds this
    pub max_total: Duration,
    /// Give up once the attempt count exceeds this
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            refused_delay: Duration::from_millis(5000),
            step: Duration::from_millis(100),
            max_delay: Duration::from_millis(3000),
            max_total: Duration::from_millis(60 * 60 * 1000),
            max_attempts: 50,
        }
    }
}

impl RetryPolicy {
    /// Starts a fresh backoff sequence under this policy.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(*self)
    }
}

// == Backoff ==
/// Running counters for one outage.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
    total: Duration,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            total: Duration::ZERO,
        }
    }

    /// Number of failed dials since the last successful connection.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Sum of all delays scheduled since the last successful connection.
    pub fn total_retry_time(&self) -> Duration {
        self.total
    }

    /// Records one failed dial and decides what happens next.
    ///
    /// The ceilings are checked before the delay is chosen, so a store that
    /// keeps refusing is also given up on after `max_attempts`.
    pub fn next(&mut self, kind: FailureKind) -> Decision {
        self.attempt = self.attempt.saturating_add(1);

        if self.total > self.policy.max_total || self.attempt > self.policy.max_attempts {
            return Decision::Exhausted;
        }

        let delay = match kind {
            FailureKind::Refused | FailureKind::Closed => self.policy.refused_delay,
            FailureKind::Transient => self
                .policy
                .step
                .saturating_mul(self.attempt)
                .min(self.policy.max_delay),
        };

        self.total = self.total.saturating_add(delay);
        Decision::RetryAfter(delay)
    }

    /// Clears the counters after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.total = Duration::ZERO;
    }
}
