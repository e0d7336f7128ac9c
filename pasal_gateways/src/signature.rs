//! HMAC-SHA256 field signing, as used by eSewa's ePay v2 protocol.
//!
//! The provider specifies an ordered list of field names (`signed_field_names`). The message to sign is the
//! comma-joined `name=value` pairs in that order. The signature is the base64-encoded HMAC-SHA256 of that
//! message under the merchant secret.

use base64::encode as b64encode;
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Build the canonical message for a signed field list, e.g.
/// `total_amount=1280.00,transaction_uuid=ORDER-12-99,product_code=EPAYTEST`.
pub fn signing_message(field_names: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    field_names
        .split(',')
        .map(str::trim)
        .filter_map(|name| lookup(name).map(|value| format!("{name}={value}")))
        .collect::<Vec<String>>()
        .join(",")
}

/// Sign an ordered field list with HMAC-SHA256 and return the base64 signature.
pub fn sign_fields(secret: &str, field_names: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let message = signing_message(field_names, lookup);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    b64encode(mac.finalize().into_bytes())
}

/// Verify a received base64 signature over an ordered field list. The comparison runs in constant time
/// (`Mac::verify_slice`), so the check leaks nothing about how close a forgery came.
pub fn verify_signed_fields(
    secret: &str,
    field_names: &str,
    received_b64: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> bool {
    let received = match base64::decode(received_b64) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("🔏️ Received signature is not valid base64: {e}");
            return false;
        },
    };
    let message = signing_message(field_names, lookup);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    mac.verify_slice(&received).is_ok()
}
