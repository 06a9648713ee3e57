//! Retry and timeout policy for forwarding.
//!
//! A single [`RetryPolicy`] governs one forwarding sequence:
//!
//! - each attempt may spend at most `connect_timeout` establishing the
//!   connection, and the whole attempt is cut off at an absolute deadline of
//!   `connect_timeout + io_timeout` from its start;
//! - at most `max_attempts` attempts are made;
//! - between attempts the forwarder sleeps for a jittered linear backoff
//!   bounded by `min_backoff` and `max_backoff` (see [`super::backoff`]).
//!
//! The defaults derive everything from one timeout: both timeouts equal it,
//! the minimum backoff is a seventh of it and the maximum backoff half of it.

use std::time::Duration;

/// Configuration for bounded, jittered retries of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum time to establish a connection.
    pub connect_timeout: Duration,

    /// Time allowed after connecting, added to `connect_timeout` to form the
    /// absolute per-attempt deadline.
    pub io_timeout: Duration,

    /// Lower bound of the per-step backoff.
    pub min_backoff: Duration,

    /// Upper bound of the per-step backoff.
    pub max_backoff: Duration,

    /// Maximum number of attempts, including the first one. Never below 1.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Default timeout for both the connect and I/O phases.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

    /// Default number of retries after the first attempt.
    pub const DEFAULT_RETRIES: u32 = 3;

    /// Derives a policy from a single timeout and a retry count.
    ///
    /// `retries` counts attempts after the first, so `retries = 3` allows four
    /// attempts in total.
    ///
    /// ```
    /// use std::time::Duration;
    /// use webhook_relay::forward::RetryPolicy;
    ///
    /// let policy = RetryPolicy::from_timeout(Duration::from_secs(70), 2);
    /// assert_eq!(policy.max_attempts, 3);
    /// assert_eq!(policy.min_backoff, Duration::from_secs(10));
    /// assert_eq!(policy.max_backoff, Duration::from_secs(35));
    /// assert_eq!(policy.attempt_deadline(), Duration::from_secs(140));
    /// ```
    pub fn from_timeout(timeout: Duration, retries: u32) -> Self {
        Self {
            connect_timeout: timeout,
            io_timeout: timeout,
            min_backoff: timeout / 7,
            max_backoff: timeout / 2,
            max_attempts: retries.saturating_add(1),
        }
    }

    /// Overrides the backoff bounds.
    pub fn with_backoff(mut self, min_backoff: Duration, max_backoff: Duration) -> Self {
        self.min_backoff = min_backoff;
        self.max_backoff = max_backoff;
        self
    }

    /// Overrides the attempt limit (clamped to at least one attempt).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// The attempt limit, never less than one.
    pub fn attempt_limit(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// The absolute per-attempt deadline, measured from the start of the attempt.
    pub fn attempt_deadline(&self) -> Duration {
        self.connect_timeout.saturating_add(self.io_timeout)
    }

    /// The longest backoff that can follow the given (1-based) attempt.
    pub fn max_backoff_after(&self, attempt: u32) -> Duration {
        self.min_backoff
            .max(self.max_backoff)
            .saturating_mul(attempt.max(1))
    }

    /// The largest possible sum of all backoffs in one sequence.
    ///
    /// The backoff after attempt `k` is at most `k` times the single-step
    /// bound, so the sum over attempts `1..n` is `step * n(n-1)/2`. Saturates
    /// at `Duration::MAX`.
    pub fn max_total_backoff(&self) -> Duration {
        let n = u128::from(self.attempt_limit());
        let steps = n * (n - 1) / 2;

        self.max_backoff_after(1)
            .as_nanos()
            .checked_mul(steps)
            .and_then(duration_from_nanos)
            .unwrap_or(Duration::MAX)
    }

    /// Upper bound on the wall-clock time of one full forwarding sequence.
    pub fn max_total_duration(&self) -> Duration {
        self.attempt_deadline()
            .saturating_mul(self.attempt_limit())
            .saturating_add(self.max_total_backoff())
    }
}

fn duration_from_nanos(nanos: u128) -> Option<Duration> {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
    let subsec = u32::try_from(nanos % NANOS_PER_SEC).ok()?;
    Some(Duration::new(secs, subsec))
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_timeout(Self::DEFAULT_TIMEOUT, Self::DEFAULT_RETRIES)
    }
}
