//! Outbound request authentication.
//!
//! A request moves from a plain [`OptionSet`] to a [`CanonicalPayload`] and
//! finally to a [`SignedRequest`] carrying the auth headers for the active
//! credential.

use base64::{engine::general_purpose, Engine};
use error_stack::{Report, ResultExt};
use http::{HeaderMap, HeaderName, HeaderValue};
use url::{form_urlencoded, Url};

use crate::constants::{
    BODY_FIELD_DATA, HEADER_CPT_ECC_NEW, HEADER_CPT_ECC_PUB, HEADER_CPT_ECC_SIGN, HEADER_CPT_HMAC,
    HEADER_CPT_KEY,
};
use crate::error::AuthError;
use crate::request_signing::credential::{Credential, EccCredential, HmacCredential};
use crate::request_signing::ecc_signer::EccSigner;
use crate::request_signing::hmac_signer::HmacSigner;
use crate::request_signing::nonce::{NonceGenerator, NonceSource};
use crate::request_signing::payload::{CanonicalPayload, OptionSet, PayloadBuilder, RequestKind};

/// Headers and body ready to hand to the transport.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    endpoint: String,
    headers: HeaderMap,
    payload: CanonicalPayload,
}

impl SignedRequest {
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The signed payload, sent as the `data` body field.
    #[must_use]
    pub fn payload(&self) -> &CanonicalPayload {
        &self.payload
    }

    /// `application/x-www-form-urlencoded` body carrying the payload.
    #[must_use]
    pub fn form_body(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair(BODY_FIELD_DATA, self.payload.as_str())
            .finish()
    }

    /// Appends the endpoint to the API base URL's path.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `base_url` cannot carry a path.
    pub fn url(&self, base_url: &Url) -> Result<Url, Report<AuthError>> {
        if base_url.cannot_be_a_base() {
            return Err(Report::new(AuthError::Configuration {
                message: format!("API base URL cannot carry a path: {base_url}"),
            }));
        }

        let mut url = base_url.clone();
        let path = format!("{}{}", base_url.path().trim_end_matches('/'), self.endpoint);
        url.set_path(&path);
        Ok(url)
    }
}

/// Endpoints are paths below the API base URL: one leading `/`, no scheme
/// and no authority.
fn check_endpoint(endpoint: &str) -> Result<(), Report<AuthError>> {
    if endpoint.starts_with('/') && !endpoint.starts_with("//") {
        return Ok(());
    }

    Err(Report::new(AuthError::Configuration {
        message: format!("Endpoint must be a path starting with a single '/': {endpoint}"),
    }))
}

/// Signs outbound requests with a single immutable credential.
pub struct RequestAuthenticator<N = NonceGenerator> {
    credential: Credential,
    builder: PayloadBuilder<N>,
}

impl RequestAuthenticator<NonceGenerator> {
    #[must_use]
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            builder: PayloadBuilder::new(),
        }
    }
}

impl<N: NonceSource> RequestAuthenticator<N> {
    pub fn with_nonce_source(credential: Credential, nonces: N) -> Self {
        Self {
            credential,
            builder: PayloadBuilder::with_nonce_source(nonces),
        }
    }

    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Signs a regular request to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be built or signed, or if a
    /// header value cannot be represented.
    pub fn sign_request(
        &self,
        endpoint: &str,
        options: OptionSet,
    ) -> Result<SignedRequest, Report<AuthError>> {
        self.authenticate(endpoint, options, RequestKind::Standard)
    }

    /// Signs an account-creation request that registers the local public key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] unless the credential is ECC.
    pub fn sign_bootstrap(
        &self,
        endpoint: &str,
        options: OptionSet,
    ) -> Result<SignedRequest, Report<AuthError>> {
        self.authenticate(endpoint, options, RequestKind::Bootstrap)
    }

    /// Builds the canonical payload for `kind`, signs it and emits headers.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for a bootstrap request under an
    /// HMAC credential, and propagates payload and signing failures.
    pub fn authenticate(
        &self,
        endpoint: &str,
        options: OptionSet,
        kind: RequestKind,
    ) -> Result<SignedRequest, Report<AuthError>> {
        check_endpoint(endpoint)?;

        let (headers, payload) = match (&self.credential, kind) {
            (Credential::Hmac(_), RequestKind::Bootstrap) => {
                return Err(Report::new(AuthError::Configuration {
                    message: "Account creation requires an ECC credential".into(),
                }));
            }
            (Credential::Hmac(credential), RequestKind::Standard) => {
                let payload = self.builder.build(options, endpoint, kind)?;
                (hmac_headers(credential, &payload)?, payload)
            }
            (Credential::Ecc(credential), _) => {
                let payload = self.builder.build(options, endpoint, kind)?;
                (ecc_headers(credential, &payload, kind)?, payload)
            }
        };

        log::debug!("Signed {} request to {endpoint} ({kind:?})", self.credential.mode());

        Ok(SignedRequest {
            endpoint: endpoint.to_string(),
            headers,
            payload,
        })
    }
}

fn hmac_headers(
    credential: &HmacCredential,
    payload: &CanonicalPayload,
) -> Result<HeaderMap, Report<AuthError>> {
    let signature = HmacSigner::sign(payload.as_str(), credential.secret());

    let mut headers = HeaderMap::new();
    insert_header(&mut headers, HEADER_CPT_KEY, credential.key_id())?;
    insert_header(&mut headers, HEADER_CPT_HMAC, &signature)?;
    Ok(headers)
}

fn ecc_headers(
    credential: &EccCredential,
    payload: &CanonicalPayload,
    kind: RequestKind,
) -> Result<HeaderMap, Report<AuthError>> {
    let signature = EccSigner::sign(payload.as_str(), credential.signing_key())?;

    let mut headers = HeaderMap::new();
    match kind {
        RequestKind::Standard => {
            insert_header(&mut headers, HEADER_CPT_ECC_PUB, &credential.fingerprint())?;
        }
        RequestKind::Bootstrap => {
            let encoded = general_purpose::STANDARD.encode(credential.public_key_pem());
            insert_header(&mut headers, HEADER_CPT_ECC_NEW, &encoded)?;
        }
    }
    insert_header(&mut headers, HEADER_CPT_ECC_SIGN, &signature)?;
    Ok(headers)
}

fn insert_header(
    headers: &mut HeaderMap,
    name: HeaderName,
    value: &str,
) -> Result<(), Report<AuthError>> {
    let value = HeaderValue::from_str(value).change_context(AuthError::Configuration {
        message: format!("Invalid value for header {name}"),
    })?;
    headers.insert(name, value);
    Ok(())
}
