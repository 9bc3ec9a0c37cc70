//! Request authentication for the Coinapult API.
//!
//! This crate signs outbound API requests and verifies signed responses and
//! callbacks. Sending requests is left to the caller's HTTP transport.
//!
//! # Modules
//!
//! - [`client`]: Composition root owning the credential and the service key
//! - [`constants`]: Header names, payload field names and the service key
//! - [`error`]: Error types and error handling utilities
//! - [`logging`]: Logger initialization
//! - [`request_signing`]: Payload building, HMAC/ECDSA signing and verification
//! - [`settings`]: Configuration management and validation
//! - [`test_support`]: Testing fixtures

pub mod client;
pub mod constants;
pub mod error;
pub mod logging;
pub mod request_signing;
pub mod settings;
