//! Client-side entry point tying credentials, signing and verification
//! together.
//!
//! A [`Client`] is built once from [`Settings`]. It holds a single immutable
//! credential and the service's public key, parsed at construction. The
//! transport that actually sends requests is left to the caller.

use error_stack::{Report, ResultExt};
use serde_json::Value;
use url::Url;

use crate::constants::{ACCOUNT_ACTIVATE_ENDPOINT, ACCOUNT_CREATE_ENDPOINT};
use crate::error::AuthError;
use crate::request_signing::{
    authenticate_hmac_callback, confirm_account_creation, reject_api_error, Credential,
    EccCredential, KnownPublicKey, OptionSet, RequestAuthenticator, ResponseVerifier,
    SignedEnvelope, SignedRequest,
};
use crate::settings::{AuthSettings, Settings};

pub struct Client {
    authenticator: RequestAuthenticator,
    verifier: ResponseVerifier,
    base_url: Url,
}

impl Client {
    /// Builds a client from loaded settings.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the base URL or any key
    /// material is invalid.
    pub fn from_settings(settings: &Settings) -> Result<Self, Report<AuthError>> {
        let base_url =
            Url::parse(&settings.api.base_url).change_context(AuthError::Configuration {
                message: format!("Invalid API base URL: {}", settings.api.base_url),
            })?;

        let known_public_key = match &settings.auth {
            AuthSettings::Ecc {
                known_public_key_pem: Some(pem),
                ..
            } => KnownPublicKey::from_pem(pem)?,
            _ => KnownPublicKey::coinapult()?,
        };

        let credential = Credential::from_settings(&settings.auth)?;
        log::info!("Initialized {} client for {}", credential.mode(), base_url);

        Ok(Self::new(credential, known_public_key, base_url))
    }

    #[must_use]
    pub fn new(credential: Credential, known_public_key: KnownPublicKey, base_url: Url) -> Self {
        Self {
            authenticator: RequestAuthenticator::new(credential),
            verifier: ResponseVerifier::new(known_public_key),
            base_url,
        }
    }

    #[must_use]
    pub fn credential(&self) -> &Credential {
        self.authenticator.credential()
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Signs a request to `endpoint` with the configured credential.
    ///
    /// # Errors
    ///
    /// Propagates payload building and signing failures.
    pub fn sign(
        &self,
        endpoint: &str,
        options: OptionSet,
    ) -> Result<SignedRequest, Report<AuthError>> {
        self.authenticator.sign_request(endpoint, options)
    }

    /// Signs a request announcing the local public key in `cpt-ecc-new`
    /// instead of its fingerprint. The payload carries no nonce or endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for an HMAC client.
    pub fn sign_bootstrap(
        &self,
        endpoint: &str,
        options: OptionSet,
    ) -> Result<SignedRequest, Report<AuthError>> {
        self.authenticator.sign_bootstrap(endpoint, options)
    }

    /// Signs the account-creation request registering the local ECC key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for an HMAC client.
    pub fn sign_account_creation(
        &self,
        options: OptionSet,
    ) -> Result<SignedRequest, Report<AuthError>> {
        self.sign_bootstrap(ACCOUNT_CREATE_ENDPOINT, options)
    }

    /// Signs the answer to the terms sent back on account creation.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for an HMAC client.
    pub fn sign_account_activation(&self, agree: bool) -> Result<SignedRequest, Report<AuthError>> {
        let credential = self.ecc_credential()?;
        let options = OptionSet::from([
            ("agree", if agree { "1" } else { "0" }.to_string()),
            ("hash", credential.fingerprint()),
        ]);
        self.sign_bootstrap(ACCOUNT_ACTIVATE_ENDPOINT, options)
    }

    /// Absolute URL a signed request should be posted to.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the base URL cannot carry a
    /// path.
    pub fn request_url(&self, request: &SignedRequest) -> Result<Url, Report<AuthError>> {
        request.url(&self.base_url)
    }

    /// Turns a response body into trusted content.
    ///
    /// ECC clients only accept responses signed by the service key. HMAC
    /// responses are plain JSON.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Api`] when the service reported an error, and any
    /// verification or decoding error for signed responses.
    pub fn open_response(&self, body: &str) -> Result<Value, Report<AuthError>> {
        match self.credential() {
            Credential::Ecc(_) => {
                let envelope = SignedEnvelope::from_json(body)?;
                self.verifier.verify_and_decode(&envelope)
            }
            Credential::Hmac(_) => {
                let content: Value =
                    serde_json::from_str(body).change_context(AuthError::InvalidMessage {
                        message: "Response body is not JSON".into(),
                    })?;
                reject_api_error(&content)?;
                Ok(content)
            }
        }
    }

    /// Verifies the account-creation response and checks that the service
    /// registered this client's key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for an HMAC client,
    /// [`AuthError::InvalidMessage`] if the response names another key, and any
    /// verification error from [`Client::open_response`].
    pub fn confirm_account_creation(&self, body: &str) -> Result<Value, Report<AuthError>> {
        let credential = self.ecc_credential()?;
        let content = self.open_response(body)?;
        confirm_account_creation(&content, credential)?;
        Ok(content)
    }

    /// Checks an HMAC-signed callback posted by the service.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for an ECC client.
    pub fn authenticate_callback(
        &self,
        received_key: &str,
        received_signature: &str,
        received_payload: &str,
    ) -> Result<bool, Report<AuthError>> {
        match self.credential() {
            Credential::Hmac(credential) => Ok(authenticate_hmac_callback(
                credential,
                received_key,
                received_signature,
                received_payload,
            )),
            Credential::Ecc(_) => Err(Report::new(AuthError::Configuration {
                message: "HMAC callbacks require an HMAC credential".into(),
            })),
        }
    }

    /// Checks an ECC-signed callback against the service key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedSignature`] if the signature cannot be
    /// decoded.
    pub fn authenticate_callback_ecc(
        &self,
        received_signature: &str,
        received_payload: &str,
    ) -> Result<bool, Report<AuthError>> {
        self.verifier.authenticate_callback(received_signature, received_payload)
    }

    fn ecc_credential(&self) -> Result<&EccCredential, Report<AuthError>> {
        match self.credential() {
            Credential::Ecc(credential) => Ok(credential),
            Credential::Hmac(_) => Err(Report::new(AuthError::Configuration {
                message: "Account creation requires an ECC credential".into(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::constants::{HEADER_CPT_ECC_NEW, HEADER_CPT_ECC_PUB, HEADER_CPT_KEY};
    use crate::request_signing::{EccSigner, HmacCredential, HmacSigner};
    use crate::test_support::tests::{
        create_test_settings, ecc_settings_str, key_a, ENVELOPE_DATA,
        KEY_A_WIRE_SIGNATURE, KEY_B_WIRE_SIGNATURE,
    };

    fn ecc_client() -> Client {
        let settings = Settings::from_toml(&ecc_settings_str()).expect("should parse settings");
        Client::from_settings(&settings).expect("should build ECC client")
    }

    fn hmac_client() -> Client {
        let credential = HmacCredential::new("abc", "s3cr3t").expect("should build");
        Client::new(
            Credential::Hmac(credential),
            KnownPublicKey::coinapult().expect("valid key"),
            Url::parse("https://api.test-coinapult.com").expect("valid URL"),
        )
    }

    #[test]
    fn test_from_settings_hmac() {
        let client = Client::from_settings(&create_test_settings()).expect("should build");

        assert_eq!(client.credential().mode(), "hmac");
        assert_eq!(client.base_url().scheme(), "https");
    }

    #[test]
    fn test_sign_and_resolve_url() {
        let client = hmac_client();
        let request = client
            .sign("/api/t/receive", OptionSet::from([("amount", "10")]))
            .expect("should sign");

        assert_eq!(
            request.headers().get(HEADER_CPT_KEY).map(|v| v.as_bytes()),
            Some(&b"abc"[..])
        );
        assert_eq!(
            client.request_url(&request).expect("should join").as_str(),
            "https://api.test-coinapult.com/api/t/receive"
        );
    }

    #[test]
    fn test_sign_account_creation_uses_bootstrap_headers() {
        let client = ecc_client();
        let request = client
            .sign_account_creation(OptionSet::new())
            .expect("should sign");

        assert_eq!(request.endpoint(), ACCOUNT_CREATE_ENDPOINT);
        assert!(request.headers().contains_key(HEADER_CPT_ECC_NEW));
        assert!(!request.headers().contains_key(HEADER_CPT_ECC_PUB));
    }

    #[test]
    fn test_sign_account_creation_requires_ecc() {
        let err = hmac_client()
            .sign_account_creation(OptionSet::new())
            .expect_err("should reject");
        assert!(matches!(
            err.current_context(),
            AuthError::Configuration { .. }
        ));
    }

    #[test]
    fn test_sign_account_activation() {
        let client = ecc_client();
        let request = client.sign_account_activation(true).expect("should sign");

        assert_eq!(request.endpoint(), ACCOUNT_ACTIVATE_ENDPOINT);
        assert!(request.headers().contains_key(HEADER_CPT_ECC_NEW));
        assert!(!request.headers().contains_key(HEADER_CPT_ECC_PUB));

        let fields = request.payload().decode().expect("should decode payload");
        assert_eq!(fields["agree"], "1");
        assert_eq!(fields["hash"], key_a().fingerprint());
        assert!(fields.get("nonce").is_none());
        assert!(fields.get("endpoint").is_none());

        let declined = client
            .sign_account_activation(false)
            .expect("should sign")
            .payload()
            .decode()
            .expect("should decode payload");
        assert_eq!(declined["agree"], "0");

        assert!(hmac_client().sign_account_activation(true).is_err());
    }

    #[test]
    fn test_sign_bootstrap_to_any_endpoint() {
        let request = ecc_client()
            .sign_bootstrap("/api/account/activate", OptionSet::from([("agree", "1")]))
            .expect("should sign");

        assert_eq!(request.endpoint(), "/api/account/activate");
        assert!(request.headers().contains_key(HEADER_CPT_ECC_NEW));
    }

    #[test]
    fn test_request_url_keeps_base_path() {
        let credential = HmacCredential::new("abc", "s3cr3t").expect("should build");
        let client = Client::new(
            Credential::Hmac(credential),
            KnownPublicKey::coinapult().expect("valid key"),
            Url::parse("https://sandbox.example.com/v1/").expect("valid URL"),
        );
        let request = client.sign("/api/t/receive", OptionSet::new()).expect("should sign");

        assert_eq!(
            client.request_url(&request).expect("should append").as_str(),
            "https://sandbox.example.com/v1/api/t/receive"
        );
        assert!(client.sign("//evil.example/api/t/receive", OptionSet::new()).is_err());
    }

    #[test]
    fn test_confirm_account_creation_from_signed_body() {
        let client = ecc_client();
        let body = json!({"sign": KEY_A_WIRE_SIGNATURE, "data": ENVELOPE_DATA}).to_string();

        let content = client
            .confirm_account_creation(&body)
            .expect("should confirm");
        assert_eq!(content["terms"], "abc");
    }

    #[test]
    fn test_open_response_rejects_foreign_signature() {
        let client = ecc_client();
        let body = json!({"sign": KEY_B_WIRE_SIGNATURE, "data": ENVELOPE_DATA}).to_string();

        let err = client.open_response(&body).expect_err("should reject");
        assert!(matches!(err.current_context(), AuthError::InvalidSignature));
    }

    #[test]
    fn test_confirm_account_creation_rejects_other_key() {
        let payload = "eyJzdWNjZXNzIjoibm90LW91ci1rZXkifQ==";
        let signature = EccSigner::sign(payload, key_a().signing_key()).expect("should sign");
        let body = json!({"sign": signature, "data": payload}).to_string();

        let err = ecc_client()
            .confirm_account_creation(&body)
            .expect_err("should reject");
        assert!(matches!(
            err.current_context(),
            AuthError::InvalidMessage { .. }
        ));
    }

    #[test]
    fn test_open_response_hmac_plain_json() {
        let client = hmac_client();

        let content = client
            .open_response(r#"{"transaction_id": "t1"}"#)
            .expect("should parse");
        assert_eq!(content["transaction_id"], "t1");

        let err = client
            .open_response(r#"{"error": "Invalid HMAC"}"#)
            .expect_err("should surface API error");
        assert!(matches!(err.current_context(), AuthError::Api { .. }));
    }

    #[test]
    fn test_authenticate_callbacks() {
        let hmac = hmac_client();
        let signature = HmacSigner::sign("callback", b"s3cr3t");
        assert!(hmac
            .authenticate_callback("abc", &signature, "callback")
            .expect("HMAC client"));
        assert!(hmac
            .authenticate_callback_ecc(KEY_A_WIRE_SIGNATURE, ENVELOPE_DATA)
            .map(|verified| !verified)
            .expect("should decode"));

        let ecc = ecc_client();
        assert!(ecc
            .authenticate_callback_ecc(KEY_A_WIRE_SIGNATURE, ENVELOPE_DATA)
            .expect("should decode"));
        assert!(ecc
            .authenticate_callback("abc", &signature, "callback")
            .is_err());
    }
}
