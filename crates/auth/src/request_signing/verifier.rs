//! Verification of signed messages originating from the service.
//!
//! Responses and callbacks are trusted only after their signature has been
//! checked against the exact payload text it covers. Nothing from a payload is
//! returned unless verification succeeded.

use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuthError;
use crate::request_signing::credential::{EccCredential, HmacCredential, KnownPublicKey};
use crate::request_signing::ecc_signer::EccSigner;
use crate::request_signing::hmac_signer::{constant_time_eq, HmacSigner};
use crate::request_signing::payload::decode_payload;

/// Signed message as carried on the wire: `{"sign": ..., "data": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SignedEnvelope {
    #[serde(rename = "sign", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl SignedEnvelope {
    #[must_use]
    pub fn new(signature: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            signature: Some(signature.into()),
            payload: Some(payload.into()),
        }
    }

    /// Parses a response body into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Api`] if the service answered with an `error`
    /// field, and [`AuthError::InvalidMessage`] if the body is not a JSON
    /// object.
    pub fn from_json(body: &str) -> Result<Self, Report<AuthError>> {
        let value: Value = serde_json::from_str(body).change_context(AuthError::InvalidMessage {
            message: "Response body is not JSON".into(),
        })?;
        reject_api_error(&value)?;

        serde_json::from_value(value).change_context(AuthError::InvalidMessage {
            message: "Response body is not a signed envelope".into(),
        })
    }
}

/// Fails with [`AuthError::Api`] when `value` carries an `error` field.
///
/// # Errors
///
/// Returns [`AuthError::Api`] with the service's message.
pub fn reject_api_error(value: &Value) -> Result<(), Report<AuthError>> {
    match value.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(message)) => Err(Report::new(AuthError::Api {
            message: message.clone(),
        })),
        Some(other) => Err(Report::new(AuthError::Api {
            message: other.to_string(),
        })),
    }
}

/// Checks inbound messages against the service's known public key.
#[derive(Debug, Clone)]
pub struct ResponseVerifier {
    known_public_key: KnownPublicKey,
}

impl ResponseVerifier {
    #[must_use]
    pub fn new(known_public_key: KnownPublicKey) -> Self {
        Self { known_public_key }
    }

    #[must_use]
    pub fn known_public_key(&self) -> &KnownPublicKey {
        &self.known_public_key
    }

    /// Verifies `envelope` and returns its decoded payload.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidMessage`] if the signature or payload is absent
    /// - [`AuthError::MalformedSignature`] if the signature cannot be decoded
    /// - [`AuthError::InvalidSignature`] if verification fails
    /// - [`AuthError::MalformedPayload`] if the payload is not base64 JSON
    pub fn verify_and_decode(&self, envelope: &SignedEnvelope) -> Result<Value, Report<AuthError>> {
        let (Some(signature), Some(payload)) = (&envelope.signature, &envelope.payload) else {
            log::warn!("Rejected ECC message without sign/data fields");
            return Err(Report::new(AuthError::InvalidMessage {
                message: "Envelope requires both sign and data".into(),
            }));
        };

        let verified = EccSigner::verify(payload, signature, self.known_public_key.verifying_key())
            .inspect_err(|_| log::warn!("Rejected ECC message with a malformed signature"))?;
        if !verified {
            log::warn!("Rejected ECC message with an invalid signature");
            return Err(Report::new(AuthError::InvalidSignature));
        }

        let content = decode_payload(payload)
            .inspect_err(|_| log::warn!("Rejected ECC message with a malformed payload"))?;
        reject_api_error(&content)?;
        Ok(content)
    }

    /// Checks an ECC-signed callback posted by the service.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedSignature`] if `signature` cannot be
    /// decoded.
    pub fn authenticate_callback(
        &self,
        signature: &str,
        payload: &str,
    ) -> Result<bool, Report<AuthError>> {
        let verified = EccSigner::verify(payload, signature, self.known_public_key.verifying_key())
            .inspect_err(|_| log::warn!("Rejected ECC callback with a malformed signature"))?;
        if !verified {
            log::warn!("Rejected ECC callback with an invalid signature");
        }
        Ok(verified)
    }
}

/// Checks an HMAC-signed callback against the local API key and secret.
///
/// Both the key and the HMAC are compared in constant time.
#[must_use]
pub fn authenticate_hmac_callback(
    credential: &HmacCredential,
    received_key: &str,
    received_signature: &str,
    received_payload: &str,
) -> bool {
    let key_matches = constant_time_eq(credential.key_id(), received_key);
    let signature_matches =
        HmacSigner::verify(received_payload, received_signature, credential.secret());

    if !(key_matches && signature_matches) {
        log::warn!("Rejected HMAC callback");
    }
    key_matches && signature_matches
}

/// Confirms that an account-creation response registered the local key.
///
/// The fingerprint is only compared when the response carries `success`;
/// responses without it (e.g. terms still to be accepted) pass unchanged.
///
/// # Errors
///
/// Returns [`AuthError::InvalidMessage`] if `success` names a fingerprint
/// other than the local public key's.
pub fn confirm_account_creation(
    content: &Value,
    credential: &EccCredential,
) -> Result<(), Report<AuthError>> {
    let Some(reported) = content.get("success") else {
        log::debug!("Account creation response carries no success field");
        return Ok(());
    };

    let expected = credential.fingerprint();
    if reported.as_str() != Some(expected.as_str()) {
        log::warn!("Account creation response names an unexpected public key");
        return Err(Report::new(AuthError::InvalidMessage {
            message: "Unexpected public key".into(),
        })
        .attach(format!("expected fingerprint {expected}")));
    }

    log::info!("Account registered for key {expected}");
    Ok(())
}
