//! Resilient forwarding of payloads to downstream functions.
//!
//! A forward is one sequence of bounded attempts:
//!
//! - [`policy`]: the timeouts, attempt limit and backoff bounds
//! - [`backoff`]: the jittered linear backoff
//! - [`attempt`]: the pure state machine deciding retry vs. stop
//! - [`transport`]: request construction and the I/O seam
//! - [`forwarder`]: the async driver tying them together

pub mod attempt;
pub mod backoff;
pub mod error;
pub mod forwarder;
pub mod policy;
pub mod transport;

pub use attempt::{AttemptResult, AttemptState, Transition};
pub use backoff::linear_jitter_backoff;
pub use error::{AttemptFailure, BuildError, ForwardError, TransportError, TransportErrorKind};
pub use forwarder::{Delivery, DisconnectPolicy, ForwardOutcome, Forwarder};
pub use policy::RetryPolicy;
pub use transport::{ForwardTarget, HttpTransport, OutboundRequest, Transport};
