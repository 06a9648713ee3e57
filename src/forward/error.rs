//! Forwarding error types.
//!
//! Errors are split by where in the sequence they happen:
//!
//! - [`BuildError`]: the outbound request could not be constructed. Terminal,
//!   no attempt is made.
//! - [`AttemptFailure`]: one attempt failed, either in transport (timeout,
//!   refused, reset) or because the downstream answered with a non-2xx
//!   status. Always retried while attempts remain.
//! - [`ForwardError`]: the terminal error of a whole sequence.

use std::error::Error as StdError;
use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// The kind of transport failure, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The connect timeout or the per-attempt deadline elapsed.
    Timeout,

    /// The connection could not be established (refused, DNS, unreachable).
    Connect,

    /// Anything else, e.g. the connection was reset mid-response.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Other => "transport",
        };
        f.write_str(label)
    }
}

/// A transport-level failure of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }

    /// Categorizes a reqwest error.
    ///
    /// Timeouts are checked first: a connect timeout is reported by reqwest
    /// as both a connect error and a timeout.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, error_chain(&err))
    }
}

/// Renders an error and its sources as `outer: inner: innermost`.
fn error_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        source = inner.source();
    }
    rendered
}

/// Why a single attempt did not deliver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("downstream responded with HTTP {0}")]
    Status(StatusCode),
}

/// The outbound request could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot build forwarding request for {url:?}: {reason}")]
pub struct BuildError {
    pub url: String,
    pub reason: String,
}

/// Terminal failure of a forwarding sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("giving up after {attempts} attempt(s): {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: AttemptFailure,
    },
}
