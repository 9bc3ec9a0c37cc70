//! Canonical payload assembly.
//!
//! The payload is the request's option map plus the anti-replay fields,
//! rendered as a JSON object of strings and base64 encoded. That base64 text
//! is both the `data` body field and the exact byte sequence that is signed.

use std::collections::BTreeMap;
use std::fmt;

use base64::{engine::general_purpose, Engine};
use error_stack::{Report, ResultExt};
use serde::Serialize;

use crate::constants::{FIELD_ENDPOINT, FIELD_NONCE, FIELD_TIMESTAMP};
use crate::error::AuthError;
use crate::request_signing::nonce::{NonceGenerator, NonceSource};

/// Logical request fields before signing. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OptionSet(BTreeMap<String, String>);

impl OptionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, replacing any previous value under the same name.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for OptionSet {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Base64 of the canonical JSON rendering; the exact string that is signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPayload(String);

impl CanonicalPayload {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Decodes the payload back into its JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedPayload`] if the text is not base64
    /// encoded UTF-8 JSON.
    pub fn decode(&self) -> Result<serde_json::Value, Report<AuthError>> {
        decode_payload(&self.0)
    }
}

impl fmt::Display for CanonicalPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a payload carries the anti-replay `nonce` and `endpoint` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Every request made with an established credential.
    Standard,
    /// Account creation under ECC. The server learns intent from the
    /// `cpt-ecc-new` header, so `nonce` and `endpoint` are left out.
    Bootstrap,
}

/// Assembles canonical payloads from option sets.
pub struct PayloadBuilder<N = NonceGenerator> {
    nonces: N,
}

impl PayloadBuilder<NonceGenerator> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nonces: NonceGenerator::new(),
        }
    }
}

impl Default for PayloadBuilder<NonceGenerator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: NonceSource> PayloadBuilder<N> {
    pub fn with_nonce_source(nonces: N) -> Self {
        Self { nonces }
    }

    /// Adds `timestamp` (and for standard requests `nonce` and `endpoint`)
    /// to `options`, then renders and encodes the result.
    ///
    /// Caller-supplied values under those field names are overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Encoding`] if the option set cannot be serialized.
    pub fn build(
        &self,
        mut options: OptionSet,
        endpoint: &str,
        kind: RequestKind,
    ) -> Result<CanonicalPayload, Report<AuthError>> {
        options.insert(FIELD_TIMESTAMP, timestamp_now());
        if kind == RequestKind::Standard {
            options.insert(FIELD_NONCE, self.nonces.next());
            options.insert(FIELD_ENDPOINT, endpoint);
        }

        let json = serde_json::to_string(&options).change_context(AuthError::Encoding {
            message: "Failed to serialize request options".into(),
        })?;

        Ok(CanonicalPayload(general_purpose::STANDARD.encode(json)))
    }
}

/// Current Unix time in whole seconds, as decimal text.
#[must_use]
pub fn timestamp_now() -> String {
    chrono::Utc::now().timestamp().to_string()
}

/// Decodes base64 payload text into a JSON value.
///
/// # Errors
///
/// Returns [`AuthError::MalformedPayload`] on invalid base64, UTF-8 or JSON.
pub fn decode_payload(payload: &str) -> Result<serde_json::Value, Report<AuthError>> {
    let bytes = general_purpose::STANDARD
        .decode(payload)
        .change_context(AuthError::MalformedPayload {
            message: "Payload is not valid base64".into(),
        })?;
    let text = String::from_utf8(bytes).change_context(AuthError::MalformedPayload {
        message: "Payload is not valid UTF-8".into(),
    })?;

    serde_json::from_str(&text).change_context(AuthError::MalformedPayload {
        message: "Payload is not valid JSON".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tests::FixedNonce;

    fn fields(payload: &CanonicalPayload) -> serde_json::Map<String, serde_json::Value> {
        match payload.decode().expect("should decode payload") {
            serde_json::Value::Object(map) => map,
            other => panic!("expected a JSON object, got {other}"),
        }
    }

    #[test]
    fn test_standard_payload_carries_anti_replay_fields() {
        let builder = PayloadBuilder::new();
        let options = OptionSet::from([("currency", "USD"), ("amount", "10")]);

        let payload = builder
            .build(options, "/api/t/receive", RequestKind::Standard)
            .expect("should build payload");
        let fields = fields(&payload);

        assert_eq!(fields["currency"], "USD");
        assert_eq!(fields["amount"], "10");
        assert_eq!(fields["endpoint"], "/api/t/receive");
        let nonce = fields["nonce"].as_str().expect("nonce should be a string");
        assert_eq!(nonce.len(), 20);
        let timestamp = fields["timestamp"]
            .as_str()
            .expect("timestamp should be a string");
        assert!(timestamp.parse::<i64>().expect("decimal seconds") > 1_600_000_000);
    }

    #[test]
    fn test_bootstrap_payload_omits_nonce_and_endpoint() {
        let builder = PayloadBuilder::new();

        let payload = builder
            .build(OptionSet::new(), "/api/account/create", RequestKind::Bootstrap)
            .expect("should build payload");
        let fields = fields(&payload);

        assert!(fields.contains_key("timestamp"));
        assert!(!fields.contains_key("nonce"));
        assert!(!fields.contains_key("endpoint"));
    }

    #[test]
    fn test_all_values_are_strings() {
        let builder = PayloadBuilder::new();
        let payload = builder
            .build(OptionSet::from([("page", "2")]), "/api/t/search", RequestKind::Standard)
            .expect("should build payload");

        assert!(fields(&payload).values().all(serde_json::Value::is_string));
    }

    #[test]
    fn test_payload_rendering_is_deterministic() {
        let builder = PayloadBuilder::with_nonce_source(FixedNonce("00112233445566778899"));
        let payload = builder
            .build(
                OptionSet::from([("b", "2"), ("a", "1")]),
                "/api/t/lock",
                RequestKind::Standard,
            )
            .expect("should build payload");

        let json = String::from_utf8(
            general_purpose::STANDARD
                .decode(payload.as_str())
                .expect("should be base64"),
        )
        .expect("should be UTF-8");
        let timestamp = fields(&payload)["timestamp"].clone();

        assert_eq!(
            json,
            format!(
                r#"{{"a":"1","b":"2","endpoint":"/api/t/lock","nonce":"00112233445566778899","timestamp":{timestamp}}}"#
            )
        );
    }

    #[test]
    fn test_reserved_fields_are_overwritten() {
        let builder = PayloadBuilder::with_nonce_source(FixedNonce("ffffffffffffffffffff"));
        let options = OptionSet::from([("endpoint", "/spoofed"), ("nonce", "reused")]);

        let payload = builder
            .build(options, "/api/t/send", RequestKind::Standard)
            .expect("should build payload");
        let fields = fields(&payload);

        assert_eq!(fields["endpoint"], "/api/t/send");
        assert_eq!(fields["nonce"], "ffffffffffffffffffff");
    }

    #[test]
    fn test_decode_payload_rejects_bad_input() {
        let not_json = general_purpose::STANDARD.encode("not json");
        let not_utf8 = general_purpose::STANDARD.encode([0xff, 0xfe]);

        for payload in ["%%%", not_json.as_str(), not_utf8.as_str()] {
            let err = decode_payload(payload).expect_err("should reject");
            assert!(matches!(
                err.current_context(),
                AuthError::MalformedPayload { .. }
            ));
        }
    }

    #[test]
    fn test_option_set_basics() {
        let mut options = OptionSet::new();
        assert!(options.is_empty());

        assert_eq!(options.insert("currency", "BTC"), None);
        assert_eq!(options.insert("currency", "USD"), Some("BTC".to_string()));
        assert_eq!(options.get("currency"), Some("USD"));
        assert!(options.contains_key("currency"));
        assert_eq!(options.len(), 1);
        assert_eq!(options.iter().collect::<Vec<_>>(), vec![("currency", "USD")]);
    }
}
