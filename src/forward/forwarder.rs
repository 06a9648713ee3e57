//! The resilient forwarder.
//!
//! Drives one forwarding sequence: build the request once, then alternate
//! attempts and backoff sleeps as dictated by [`AttemptState::advance`] until
//! the payload is delivered or the attempts run out.

use std::str::FromStr;

use axum::body::Bytes;
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::attempt::{AttemptState, Transition};
use super::error::{AttemptFailure, BuildError, ForwardError};
use super::policy::RetryPolicy;
use super::transport::{ForwardTarget, OutboundRequest, Transport};
use crate::routing::InvalidPolicy;

/// A successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// The 2xx status returned by the downstream.
    pub status: StatusCode,

    /// Number of attempts made, including the successful one.
    pub attempts: u32,
}

/// Terminal state of a forwarding sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Some attempt returned a 2xx.
    Delivered(Delivery),

    /// Every attempt failed.
    Exhausted {
        attempts: u32,
        last_error: AttemptFailure,
    },

    /// The request could not be constructed; no attempt was made.
    BuildError(BuildError),
}

impl ForwardOutcome {
    /// Converts to a Result, treating exhaustion and build errors as Err.
    pub fn into_result(self) -> Result<Delivery, ForwardError> {
        match self {
            ForwardOutcome::Delivered(delivery) => Ok(delivery),
            ForwardOutcome::Exhausted {
                attempts,
                last_error,
            } => Err(ForwardError::Exhausted {
                attempts,
                last_error,
            }),
            ForwardOutcome::BuildError(e) => Err(ForwardError::Build(e)),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, ForwardOutcome::Delivered(_))
    }

    /// Number of outbound calls made.
    pub fn attempts(&self) -> u32 {
        match self {
            ForwardOutcome::Delivered(delivery) => delivery.attempts,
            ForwardOutcome::Exhausted { attempts, .. } => *attempts,
            ForwardOutcome::BuildError(_) => 0,
        }
    }
}

/// What happens to an in-flight forward when the inbound client goes away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisconnectPolicy {
    /// Finish the retry sequence regardless.
    #[default]
    CompleteRetries,

    /// Drop the remaining attempts along with the inbound request.
    Abandon,
}

impl FromStr for DisconnectPolicy {
    type Err = InvalidPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "complete" => Ok(DisconnectPolicy::CompleteRetries),
            "abandon" => Ok(DisconnectPolicy::Abandon),
            _ => Err(InvalidPolicy {
                value: s.to_string(),
                expected: "complete, abandon",
            }),
        }
    }
}

/// Forwards payloads under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Forwarder<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T> Forwarder<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Forwarder<T> {
    /// Forwards `payload` to `target`.
    ///
    /// Makes at most `policy.max_attempts` outbound calls, one per attempt,
    /// sleeping for a jittered linear backoff between failed attempts.
    pub async fn forward(&self, target: &ForwardTarget, payload: Bytes) -> ForwardOutcome {
        let request = match OutboundRequest::build(target, payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Cannot build forwarding request");
                return ForwardOutcome::BuildError(e);
            }
        };

        let mut state = AttemptState::new();

        loop {
            debug!(
                url = %request.url(),
                attempt = state.attempts() + 1,
                max_attempts = self.policy.attempt_limit(),
                "Forwarding payload"
            );

            let result = self.transport.send(&request).await;

            let transition = {
                let mut rng = rand::thread_rng();
                state.advance(result, &self.policy, &mut rng)
            };

            match transition {
                Transition::Delivered { status, attempts } => {
                    debug!(url = %request.url(), %status, attempts, "Payload delivered");
                    return ForwardOutcome::Delivered(Delivery { status, attempts });
                }
                Transition::Exhausted {
                    attempts,
                    last_error,
                } => {
                    warn!(
                        url = %request.url(),
                        attempts,
                        error = %last_error,
                        "Forwarding attempts exhausted"
                    );
                    return ForwardOutcome::Exhausted {
                        attempts,
                        last_error,
                    };
                }
                Transition::Retry(next) => {
                    let delay = next.next_backoff().unwrap_or_default();
                    if let Some(error) = next.last_error() {
                        warn!(
                            url = %request.url(),
                            attempt = next.attempts(),
                            error = %error,
                            delay = ?delay,
                            "Forwarding attempt failed, retrying"
                        );
                    }
                    tokio::time::sleep(delay).await;
                    state = next;
                }
            }
        }
    }
}
