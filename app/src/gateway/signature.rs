//! Webhook signature verification.
//!
//! The gateway signs the raw request body with HMAC-SHA512 keyed by the
//! secret key and sends the lowercase hex digest in `x-paystack-signature`.

use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Hex HMAC-SHA512 of `body` under `secret`.
#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Whether `signature` is the hex HMAC-SHA512 of `body` under `secret`.
///
/// Comparison is constant time. An empty secret never verifies.
#[must_use]
pub fn verify(secret: &str, body: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    constant_time_eq(expected.as_slice(), provided.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: &str = "sk_test_webhook";

    #[test]
    fn accepts_own_signature() {
        let body = br#"{"event":"charge.success","data":{"reference":"BKG-1"}}"#;
        let signature = sign(SECRET, body);
        assert_eq!(signature.len(), 128);
        assert!(verify(SECRET, body, &signature));
        assert!(verify(SECRET, body, &signature.to_uppercase()));
    }

    #[test]
    fn rejects_tampered_body() {
        let signature = sign(SECRET, br#"{"amount":100}"#);
        assert!(!verify(SECRET, br#"{"amount":900}"#, &signature));
    }

    #[test]
    fn rejects_wrong_secret_and_garbage() {
        let body = b"{}";
        assert!(!verify(SECRET, body, &sign("another", body)));
        assert!(!verify(SECRET, body, "not-hex"));
        assert!(!verify(SECRET, body, ""));
        assert!(!verify("", body, &sign("", body)));
    }

    proptest! {
        #[test]
        fn any_flipped_bit_fails(
            body in prop::collection::vec(any::<u8>(), 1..256),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let signature = sign(SECRET, &body);
            let mut tampered = body.clone();
            let i = index.index(tampered.len());
            tampered[i] ^= 1 << bit;
            prop_assert!(!verify(SECRET, &tampered, &signature));
        }
    }
}
