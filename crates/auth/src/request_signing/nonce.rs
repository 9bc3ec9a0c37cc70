//! Anti-replay nonces for signed requests.

use rand::rngs::OsRng;
use rand::RngCore;

/// Number of random bytes behind each nonce (20 hex characters on the wire).
pub const NONCE_BYTES: usize = 10;

/// Source of anti-replay tokens inserted into every non-bootstrap payload.
pub trait NonceSource: Send + Sync {
    fn next(&self) -> String;
}

/// Draws nonces from the operating system CSPRNG.
///
/// `OsRng` carries no state of its own, so a single generator can be shared
/// between threads without locking.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonceGenerator;

impl NonceGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl NonceSource for NonceGenerator {
    fn next(&self) -> String {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}
