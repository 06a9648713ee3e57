//! Inbound hook parsing.
//!
//! Turns a raw inbound request (headers plus body) into a [`HookContext`].
//! The required headers are checked first, then the body is read in full,
//! then the signature is verified. A `HookContext` is only ever produced for
//! a request whose signature has already been verified.

use axum::body::{Body, Bytes};
use axum::http::HeaderMap;
use thiserror::Error;

use super::signature::verify_signature;
use crate::types::{DeliveryId, EventType, WebhookSecret};

/// Header name for the GitHub HMAC-SHA1 signature.
pub const HEADER_SIGNATURE: &str = "x-hub-signature";
/// Header name for the GitHub event type.
pub const HEADER_EVENT: &str = "x-github-event";
/// Header name for the GitHub delivery ID.
pub const HEADER_DELIVERY: &str = "x-github-delivery";

/// Errors that reject an inbound hook before it is interpreted.
#[derive(Debug, Error)]
pub enum HookError {
    /// A required header is absent, empty, or not valid header text.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// The request body could not be read (client error or size limit).
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] axum::Error),

    /// The signature did not verify. Covers malformed headers and digest
    /// mismatches alike.
    #[error("invalid webhook signature")]
    AuthenticationFailed,
}

/// An authenticated inbound webhook.
#[derive(Debug, Clone)]
pub struct HookContext {
    signature: String,
    event: EventType,
    delivery: DeliveryId,
    payload: Bytes,
}

impl HookContext {
    /// The `X-Hub-Signature` value that was verified.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn event(&self) -> &EventType {
        &self.event
    }

    pub fn delivery(&self) -> &DeliveryId {
        &self.delivery
    }

    /// The raw body, byte-for-byte as received.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consumes the context, returning the raw body.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

/// Parses and authenticates an inbound hook.
///
/// Headers are checked in order (signature, event, delivery); the first one
/// missing is reported. The body is then read in full, up to `body_limit`
/// bytes, and verified against `secret`.
///
/// # Errors
///
/// * [`HookError::MissingHeader`] - a required header is missing or empty
/// * [`HookError::BodyRead`] - the body could not be read or exceeded the limit
/// * [`HookError::AuthenticationFailed`] - the signature did not verify
pub async fn parse_hook(
    secret: &WebhookSecret,
    headers: &HeaderMap,
    body: Body,
    body_limit: usize,
) -> Result<HookContext, HookError> {
    let signature = get_header(headers, HEADER_SIGNATURE)?;
    let event = EventType::new(get_header(headers, HEADER_EVENT)?);
    let delivery = DeliveryId::new(get_header(headers, HEADER_DELIVERY)?);

    let payload = axum::body::to_bytes(body, body_limit)
        .await
        .map_err(HookError::BodyRead)?;

    if !verify_signature(&payload, &signature, secret.as_bytes()) {
        return Err(HookError::AuthenticationFailed);
    }

    Ok(HookContext {
        signature,
        event,
        delivery,
        payload,
    })
}

/// Extracts a required, non-empty header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, HookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or(HookError::MissingHeader(name))
}
