//! Webhook signature verification.
//!
//! GitHub signs each delivery with HMAC-SHA256 over the raw request body
//! and sends `sha256=<hex digest>` in the `X-Hub-Signature-256` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";

/// Compute the `sha256=<hex>` signature GitHub would send for `body`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mac = match HmacSha256::new_from_slice(secret) {
        Ok(mut mac) => {
            mac.update(body);
            mac.finalize().into_bytes()
        }
        Err(_) => return String::new(),
    };
    format!("sha256={}", hex::encode(mac))
}

/// Check a delivery's signature header against `secret`. The comparison is
/// constant-time.
pub fn verify_signature(secret: &[u8], body: &[u8], header: Option<&str>) -> bool {
    let Some(hex_digest) = header.and_then(|h| h.trim().strip_prefix("sha256=")) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
