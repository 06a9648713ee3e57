//! Webhook Relay - receives signed GitHub webhooks and forwards them to
//! function-execution endpoints.
//!
//! A delivery is authenticated with HMAC-SHA1, routed by the payload's
//! `repository.name`, and forwarded with bounded, jittered retries.

pub mod config;
pub mod forward;
pub mod routing;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
mod test_utils;
