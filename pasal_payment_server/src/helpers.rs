use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Constant-time comparison of a presented API key against the configured one. Both values are run through
/// HMAC-SHA256 with a fixed key and the MACs are compared with the crate's constant-time check, so the
/// comparison time does not depend on how many leading bytes match.
pub fn api_keys_match(expected: &str, presented: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let mut mac = Hmac::<Sha256>::new_from_slice(b"pps-admin-key-check").expect("HMAC accepts any key length");
    mac.update(expected.as_bytes());
    let expected_tag = mac.finalize().into_bytes();

    let mut mac = Hmac::<Sha256>::new_from_slice(b"pps-admin-key-check").expect("HMAC accepts any key length");
    mac.update(presented.as_bytes());
    mac.verify_slice(&expected_tag).is_ok()
}

/// Generates a fresh invoice number for a checkout, e.g. `PSL-1718452996-48151`.
pub fn new_invoice() -> String {
    let ts = chrono::Utc::now().timestamp();
    let salt = rand::random::<u16>();
    format!("PSL-{ts}-{salt}")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn key_comparison() {
        assert!(api_keys_match("s3cret", "s3cret"));
        assert!(!api_keys_match("s3cret", "s3cret "));
        assert!(!api_keys_match("s3cret", ""));
        // An unconfigured key matches nothing, not even the empty string.
        assert!(!api_keys_match("", ""));
    }

    #[test]
    fn invoices_are_unique_enough() {
        let a = new_invoice();
        let b = new_invoice();
        assert!(a.starts_with("PSL-"));
        assert_ne!(a, b);
    }
}
