use http::header::HeaderName;

pub const HEADER_CPT_KEY: HeaderName = HeaderName::from_static("cpt-key");
pub const HEADER_CPT_HMAC: HeaderName = HeaderName::from_static("cpt-hmac");
pub const HEADER_CPT_ECC_PUB: HeaderName = HeaderName::from_static("cpt-ecc-pub");
pub const HEADER_CPT_ECC_NEW: HeaderName = HeaderName::from_static("cpt-ecc-new");
pub const HEADER_CPT_ECC_SIGN: HeaderName = HeaderName::from_static("cpt-ecc-sign");

/// Form field carrying the canonical payload in request bodies.
pub const BODY_FIELD_DATA: &str = "data";

pub const FIELD_ENDPOINT: &str = "endpoint";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_NONCE: &str = "nonce";

/// Endpoint used to register a new public key.
pub const ACCOUNT_CREATE_ENDPOINT: &str = "/api/account/create";

/// Endpoint used to accept or decline the terms of a new account.
pub const ACCOUNT_ACTIVATE_ENDPOINT: &str = "/api/account/activate";

pub const DEFAULT_BASE_URL: &str = "https://api.coinapult.com";

/// secp256k1 key the service signs its responses and callbacks with.
pub const COINAPULT_PUBLIC_KEY_PEM: &str = "-----BEGIN PUBLIC KEY-----
MFYwEAYHKoZIzj0CAQYFK4EEAAoDQgAEWp9wd4EuLhIZNaoUgZxQztSjrbqgTT0w
LBq8RwigNE6nOOXFEoGCjGfekugjrHWHUi8ms7bcfrowpaJKqMfZXg==
-----END PUBLIC KEY-----";
