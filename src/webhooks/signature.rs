//! GitHub webhook signature verification using HMAC-SHA1.
//!
//! GitHub signs webhook payloads with HMAC-SHA1 over the raw body, keyed by
//! the shared secret, and sends the digest in the `X-Hub-Signature` header as
//! `sha1=<40 lowercase hex chars>`.
//!
//! Verification runs before the body is interpreted in any way. Headers of
//! the wrong length or with the wrong prefix are rejected before any hex
//! decoding happens; the digest comparison itself is constant-time.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Prefix of the `X-Hub-Signature` header value.
pub const SIGNATURE_PREFIX: &str = "sha1=";

/// Size of an HMAC-SHA1 digest in bytes.
pub const DIGEST_LEN: usize = 20;

/// Exact length of a well-formed header: prefix plus hex-encoded digest.
pub const SIGNATURE_HEADER_LEN: usize = SIGNATURE_PREFIX.len() + 2 * DIGEST_LEN;

/// Parses a signature header (e.g. `"sha1=0a1b..."`) into raw digest bytes.
///
/// Returns `None` for any header that is not exactly [`SIGNATURE_HEADER_LEN`]
/// bytes long, lacks the `sha1=` prefix, or carries invalid hex. The length
/// and prefix checks run first, so clearly malformed input is never decoded.
/// Never panics.
///
/// # Examples
///
/// ```
/// use webhook_relay::webhooks::parse_signature_header;
///
/// let header = format!("sha1={}", "ab".repeat(20));
/// assert_eq!(parse_signature_header(&header), Some([0xab; 20]));
///
/// // Wrong algorithm
/// assert!(parse_signature_header(&format!("sha256={}", "ab".repeat(20))).is_none());
///
/// // Too short
/// assert!(parse_signature_header("sha1=abcd").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<[u8; DIGEST_LEN]> {
    if header.len() != SIGNATURE_HEADER_LEN {
        return None;
    }
    let hex_sig = header.strip_prefix(SIGNATURE_PREFIX)?;

    let mut digest = [0u8; DIGEST_LEN];
    hex::decode_to_slice(hex_sig, &mut digest).ok()?;
    Some(digest)
}

/// Computes the HMAC-SHA1 digest of a payload using the given secret.
///
/// This is what GitHub computes on its side; it is also used to sign test
/// requests.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> [u8; DIGEST_LEN] {
    let mut mac = new_mac(secret);
    mac.update(payload);

    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&mac.finalize().into_bytes());
    digest
}

/// Formats a digest as a GitHub-style header value: `sha1=<lowercase hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(signature))
}

/// Verifies a GitHub webhook signature against the payload and secret.
///
/// Returns `true` only if `signature_header` is the well-formed HMAC-SHA1 of
/// `payload` under `secret`. The digest comparison is constant-time.
///
/// # Arguments
///
/// * `payload` - The raw webhook body, exactly as received
/// * `signature_header` - The value of the `X-Hub-Signature` header
/// * `secret` - The shared webhook secret
///
/// # Examples
///
/// ```
/// use webhook_relay::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let payload = br#"{"repository":{"name":"test"}}"#;
/// let header = format_signature_header(&compute_signature(payload, b"1234"));
///
/// assert!(verify_signature(payload, &header, b"1234"));
/// assert!(!verify_signature(payload, &header, b"4321"));
/// ```
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };

    let mut mac = new_mac(secret);
    mac.update(payload);

    // Constant-time comparison via the HMAC library
    mac.verify_slice(&expected).is_ok()
}

fn new_mac(secret: &[u8]) -> HmacSha1 {
    HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size")
}
