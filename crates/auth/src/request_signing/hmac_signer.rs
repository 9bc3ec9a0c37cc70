//! Shared-secret HMAC-SHA512 signatures.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

type HmacSha512 = Hmac<Sha512>;

pub struct HmacSigner;

impl HmacSigner {
    /// Returns the lowercase hex HMAC-SHA512 of `payload` keyed with `secret`.
    #[must_use]
    pub fn sign(payload: &str, secret: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(secret).expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Recomputes the HMAC and compares it against `candidate_signature`.
    ///
    /// The comparison is case-sensitive and runs in constant time.
    #[must_use]
    pub fn verify(payload: &str, candidate_signature: &str, secret: &[u8]) -> bool {
        let expected = Self::sign(payload, secret);
        constant_time_eq(&expected, candidate_signature)
    }
}

/// Constant-time string equality. Lengths are not secret.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tests::{HMAC_FIXTURE_PAYLOAD, HMAC_FIXTURE_SIGNATURE};

    #[test]
    fn test_sign_matches_known_vector() {
        assert_eq!(
            HmacSigner::sign(HMAC_FIXTURE_PAYLOAD, b"s3cr3t"),
            HMAC_FIXTURE_SIGNATURE
        );
    }

    #[test]
    fn test_sign_then_verify() {
        let signature = HmacSigner::sign("payload", b"secret");

        assert_eq!(signature.len(), 128);
        assert!(HmacSigner::verify("payload", &signature, b"secret"));
    }

    #[test]
    fn test_verify_rejects_other_secret() {
        let signature = HmacSigner::sign("payload", b"secret");

        assert!(!HmacSigner::verify("payload", &signature, b"other-secret"));
    }

    #[test]
    fn test_verify_rejects_other_payload() {
        let signature = HmacSigner::sign("payload", b"secret");

        assert!(!HmacSigner::verify("payload2", &signature, b"secret"));
    }

    #[test]
    fn test_verify_is_case_sensitive() {
        let signature = HmacSigner::sign("payload", b"secret").to_uppercase();

        assert!(!HmacSigner::verify("payload", &signature, b"secret"));
    }

    #[test]
    fn test_verify_rejects_truncated_signature() {
        let signature = HmacSigner::sign("payload", b"secret");

        assert!(!HmacSigner::verify("payload", &signature[..64], b"secret"));
        assert!(!HmacSigner::verify("payload", "", b"secret"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
