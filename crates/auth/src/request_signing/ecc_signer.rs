//! ECDSA (secp256k1, SHA-256) signatures in the `r|s` wire format.
//!
//! Signing uses RFC 6979 deterministic nonces, so the same key and payload
//! always produce the same wire signature.

use error_stack::Report;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};

use crate::error::AuthError;
use crate::request_signing::codec;

pub struct EccSigner;

impl EccSigner {
    /// Signs the raw bytes of `payload` and returns the wire signature.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Encoding`] if the signature cannot be rendered in
    /// the wire format.
    pub fn sign(payload: &str, private_key: &SigningKey) -> Result<String, Report<AuthError>> {
        let signature: Signature = private_key.sign(payload.as_bytes());
        let (r, s) = codec::decode_der(signature.to_der().as_bytes())?;
        codec::encode(&r, &s)
    }

    /// Checks a wire signature over the raw bytes of `payload`.
    ///
    /// A signature that decodes but does not describe a usable ECDSA pair
    /// (zero or out-of-range components) verifies as `false`. High-S
    /// signatures are normalized before verification.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedSignature`] if `wire_signature` cannot be
    /// decoded at all.
    pub fn verify(
        payload: &str,
        wire_signature: &str,
        public_key: &VerifyingKey,
    ) -> Result<bool, Report<AuthError>> {
        let (r, s) = codec::decode_wire(wire_signature)?;

        let Ok(der) = codec::to_der(&r, &s) else {
            log::warn!("ECC signature components are outside the curve order");
            return Ok(false);
        };
        let Ok(signature) = Signature::from_der(&der) else {
            return Ok(false);
        };
        let signature = signature.normalize_s().unwrap_or(signature);

        Ok(public_key.verify(payload.as_bytes(), &signature).is_ok())
    }
}
