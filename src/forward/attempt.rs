//! The forwarding state machine, free of I/O.
//!
//! [`AttemptState`] records how many attempts have been made, the last
//! failure, and the backoff to wait before the next attempt. Each attempt's
//! result is fed to [`AttemptState::advance`], which decides whether the
//! sequence is delivered, exhausted, or should retry after a delay. The
//! forwarder only performs the request and the sleep.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;

use super::backoff::linear_jitter_backoff;
use super::error::{AttemptFailure, TransportError};
use super::policy::RetryPolicy;

/// The raw result of one attempt: a response status or a transport failure.
pub type AttemptResult = Result<StatusCode, TransportError>;

/// Progress of one forwarding sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptState {
    attempts: u32,
    last_error: Option<AttemptFailure>,
    next_backoff: Option<Duration>,
}

/// The decision taken after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The downstream answered 2xx.
    Delivered { status: StatusCode, attempts: u32 },

    /// The attempt failed and another is allowed. The new state carries the
    /// backoff to wait first.
    Retry(AttemptState),

    /// The attempt failed and the limit is reached.
    Exhausted {
        attempts: u32,
        last_error: AttemptFailure,
    },
}

impl AttemptState {
    /// State before the first attempt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&AttemptFailure> {
        self.last_error.as_ref()
    }

    /// How long to wait before the next attempt. `None` before any failure.
    pub fn next_backoff(&self) -> Option<Duration> {
        self.next_backoff
    }

    /// Records the result of the next attempt and decides what happens next.
    ///
    /// A 2xx status delivers. A non-2xx status or a transport failure retries
    /// while fewer than `policy.attempt_limit()` attempts have been made, and
    /// is otherwise terminal.
    pub fn advance<R>(self, result: AttemptResult, policy: &RetryPolicy, rng: &mut R) -> Transition
    where
        R: Rng + ?Sized,
    {
        let attempts = self.attempts.saturating_add(1);

        let failure = match result {
            Ok(status) if status.is_success() => {
                return Transition::Delivered { status, attempts };
            }
            Ok(status) => AttemptFailure::Status(status),
            Err(e) => AttemptFailure::Transport(e),
        };

        if attempts >= policy.attempt_limit() {
            return Transition::Exhausted {
                attempts,
                last_error: failure,
            };
        }

        let backoff = linear_jitter_backoff(policy.min_backoff, policy.max_backoff, attempts, rng);

        Transition::Retry(AttemptState {
            attempts,
            last_error: Some(failure),
            next_backoff: Some(backoff),
        })
    }
}
