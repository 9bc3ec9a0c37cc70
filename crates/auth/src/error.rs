use derive_more::Display;

/// Errors raised while authenticating outbound requests or verifying inbound
/// signed messages.
///
/// None of these are retried by this crate. Retry policy belongs to the
/// transport that carries the signed request.
#[derive(Debug, Display)]
pub enum AuthError {
    /// Missing or mismatched credential for the selected auth mode.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// A value cannot be rendered into the wire format.
    #[display("Encoding error: {message}")]
    Encoding { message: String },

    /// Signature input that cannot be decoded structurally.
    #[display("Malformed signature: {message}")]
    MalformedSignature { message: String },

    /// Well-formed signature that fails cryptographic verification.
    #[display("Invalid signature")]
    InvalidSignature,

    /// Envelope missing required fields or carrying unexpected content.
    #[display("Invalid message: {message}")]
    InvalidMessage { message: String },

    /// Payload that is not valid base64 encoded JSON.
    #[display("Malformed payload: {message}")]
    MalformedPayload { message: String },

    /// The remote service answered with an `error` field.
    #[display("API error: {message}")]
    Api { message: String },
}

impl core::error::Error for AuthError {}
