//! Domain Services
//!
//! Invoice numbering and webhook signature verification.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate an invoice number for the given year
///
/// Format is `INV-<year>-<6 digits>`. The numeric part is drawn at random
/// rather than sequentially, so invoice numbers do not reveal billing
/// volume; the unique index on the column catches the rare collision and
/// the caller retries with a fresh number.
pub fn generate_invoice_number(year: i32) -> String {
    let serial: u32 = rand::rng().random_range(0..1_000_000);
    format!("INV-{}-{:06}", year, serial)
}

/// Verify a hex-encoded HMAC-SHA256 webhook signature over the raw body
///
/// The underlying MAC comparison runs in constant time, so a forged
/// signature cannot be refined byte by byte from response timing.
pub fn verify_webhook_signature(secret: &[u8], body: &[u8], signature_hex: &str) -> bool {
    let Ok(provided) = hex::decode(signature_hex.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_invoice_number_format() {
        let number = generate_invoice_number(2026);
        assert!(number.starts_with("INV-2026-"));

        let serial = number.strip_prefix("INV-2026-").unwrap();
        assert_eq!(serial.len(), 6);
        assert!(serial.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_valid_signature_accepted() {
        let secret = b"webhook-secret";
        let body = br#"{"eventType":"payment.succeeded"}"#;
        let signature = sign(secret, body);

        assert!(verify_webhook_signature(secret, body, &signature));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let secret = b"webhook-secret";
        let signature = sign(secret, b"original body");

        assert!(!verify_webhook_signature(secret, b"tampered body", &signature));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"payload";
        let signature = sign(b"secret-a", body);

        assert!(!verify_webhook_signature(b"secret-b", body, &signature));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let secret = b"webhook-secret";
        let body = b"payload";

        assert!(!verify_webhook_signature(secret, body, "not hex at all"));
        assert!(!verify_webhook_signature(secret, body, "abc"));
        assert!(!verify_webhook_signature(secret, body, ""));
        // Valid hex but wrong length
        assert!(!verify_webhook_signature(secret, body, "deadbeef"));
    }
}
