//! Request signing and response verification for the Coinapult API.
//!
//! Outbound requests are signed with either a shared HMAC secret or a local
//! secp256k1 key. Inbound responses and callbacks are verified against the
//! service's public key before any of their content is trusted.

pub mod authenticator;
pub mod codec;
pub mod credential;
pub mod ecc_signer;
pub mod hmac_signer;
pub mod nonce;
pub mod payload;
pub mod verifier;

pub use authenticator::*;
pub use credential::*;
pub use ecc_signer::*;
pub use hmac_signer::*;
pub use nonce::*;
pub use payload::*;
pub use verifier::*;
