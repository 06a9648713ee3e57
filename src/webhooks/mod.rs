//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA1)
//! - Parsing of inbound requests into an authenticated [`HookContext`]

pub mod hook;
pub mod signature;

pub use hook::{HEADER_DELIVERY, HEADER_EVENT, HEADER_SIGNATURE, HookContext, HookError, parse_hook};
pub use signature::{
    compute_signature, format_signature_header, parse_signature_header, verify_signature,
};
