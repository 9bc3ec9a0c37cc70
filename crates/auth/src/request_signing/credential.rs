//! Credentials for the two authentication modes and the remote service key.

use std::fmt;

use error_stack::Report;
use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::zeroize::Zeroizing;
use k256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use k256::SecretKey;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::constants::COINAPULT_PUBLIC_KEY_PEM;
use crate::error::AuthError;
use crate::settings::AuthSettings;

/// Hex SHA-256 of a public key's PEM text.
///
/// The service identifies registered keys by this value.
#[must_use]
pub fn fingerprint(public_key_pem: &str) -> String {
    hex::encode(Sha256::digest(public_key_pem.as_bytes()))
}

/// The single credential an authenticated client signs with.
#[derive(Debug)]
pub enum Credential {
    Hmac(HmacCredential),
    Ecc(EccCredential),
}

impl Credential {
    /// Builds the credential described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the selected mode is missing a
    /// key or secret, or if a PEM cannot be parsed.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, Report<AuthError>> {
        match settings {
            AuthSettings::Hmac { key, secret } => {
                HmacCredential::new(key.as_str(), secret.as_bytes()).map(Self::Hmac)
            }
            AuthSettings::Ecc {
                private_key_pem,
                public_key_pem,
                ..
            } => {
                let credential = match public_key_pem {
                    Some(public_key_pem) => {
                        EccCredential::from_pem_pair(private_key_pem, public_key_pem)
                    }
                    None => EccCredential::from_private_key_pem(private_key_pem),
                }?;
                Ok(Self::Ecc(credential))
            }
        }
    }

    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Hmac(_) => "hmac",
            Self::Ecc(_) => "ecc",
        }
    }
}

/// API key id and shared secret issued by the service.
pub struct HmacCredential {
    key_id: String,
    secret: Vec<u8>,
}

impl HmacCredential {
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the key id or secret is empty.
    pub fn new(
        key_id: impl Into<String>,
        secret: impl Into<Vec<u8>>,
    ) -> Result<Self, Report<AuthError>> {
        let key_id = key_id.into();
        let secret = secret.into();

        if key_id.trim().is_empty() {
            return Err(Report::new(AuthError::Configuration {
                message: "HMAC authentication requires an API key".into(),
            }));
        }
        if secret.is_empty() {
            return Err(Report::new(AuthError::Configuration {
                message: "HMAC authentication requires an API secret".into(),
            }));
        }

        log::info!("Loaded HMAC credential for key id {key_id}");
        Ok(Self { key_id, secret })
    }

    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    #[must_use]
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for HmacCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacCredential")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Local secp256k1 keypair plus the PEM text of its public half.
pub struct EccCredential {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    public_key_pem: String,
}

impl EccCredential {
    /// Generates a fresh keypair, e.g. ahead of account creation.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the public key cannot be
    /// exported as PEM.
    pub fn generate() -> Result<Self, Report<AuthError>> {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Loads a private key in SEC1 (`EC PRIVATE KEY`) or PKCS#8
    /// (`PRIVATE KEY`) PEM form.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the PEM is empty, cannot be
    /// parsed, or holds a key for another curve.
    pub fn from_private_key_pem(private_key_pem: &str) -> Result<Self, Report<AuthError>> {
        if private_key_pem.trim().is_empty() {
            return Err(Report::new(AuthError::Configuration {
                message: "ECC authentication requires a private key".into(),
            }));
        }

        let secret_key = SecretKey::from_sec1_pem(private_key_pem)
            .or_else(|_| SecretKey::from_pkcs8_pem(private_key_pem))
            .map_err(|e| {
                Report::new(AuthError::Configuration {
                    message: format!("Failed to parse secp256k1 private key PEM: {e}"),
                })
            })?;

        Self::from_signing_key(SigningKey::from(secret_key))
    }

    /// Loads a private key and checks that `public_key_pem` belongs to it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if either PEM cannot be parsed or
    /// the keys do not match.
    pub fn from_pem_pair(
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Result<Self, Report<AuthError>> {
        let credential = Self::from_private_key_pem(private_key_pem)?;
        let public_key = VerifyingKey::from_public_key_pem(public_key_pem.trim()).map_err(|e| {
            Report::new(AuthError::Configuration {
                message: format!("Failed to parse secp256k1 public key PEM: {e}"),
            })
        })?;

        if public_key != credential.verifying_key {
            return Err(Report::new(AuthError::Configuration {
                message: "Public key does not match the private key".into(),
            }));
        }

        Ok(credential)
    }

    fn from_signing_key(signing_key: SigningKey) -> Result<Self, Report<AuthError>> {
        let verifying_key = *signing_key.verifying_key();
        let public_key_pem = verifying_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| {
                Report::new(AuthError::Configuration {
                    message: format!("Failed to export public key PEM: {e}"),
                })
            })?
            .trim()
            .to_string();

        log::info!(
            "Loaded ECC credential with fingerprint {}",
            fingerprint(&public_key_pem)
        );

        Ok(Self {
            signing_key,
            verifying_key,
            public_key_pem,
        })
    }

    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Trimmed SPKI PEM text of the public key.
    #[must_use]
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.public_key_pem)
    }

    /// Exports the private key as SEC1 PEM so it can be stored by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Encoding`] if the key cannot be serialized.
    pub fn private_key_pem(&self) -> Result<Zeroizing<String>, Report<AuthError>> {
        let secret_key = SecretKey::from_bytes(&self.signing_key.to_bytes()).map_err(|e| {
            Report::new(AuthError::Encoding {
                message: format!("Invalid private key scalar: {e}"),
            })
        })?;

        secret_key.to_sec1_pem(LineEnding::LF).map_err(|e| {
            Report::new(AuthError::Encoding {
                message: format!("Failed to export private key PEM: {e}"),
            })
        })
    }
}

impl fmt::Debug for EccCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EccCredential")
            .field("fingerprint", &self.fingerprint())
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

/// Public key the service signs responses and callbacks with.
#[derive(Debug, Clone)]
pub struct KnownPublicKey {
    verifying_key: VerifyingKey,
}

impl KnownPublicKey {
    /// Parses the key compiled into the client.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the compiled-in PEM is invalid.
    pub fn coinapult() -> Result<Self, Report<AuthError>> {
        Self::from_pem(COINAPULT_PUBLIC_KEY_PEM)
    }

    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `pem` is not a secp256k1 SPKI
    /// public key.
    pub fn from_pem(pem: &str) -> Result<Self, Report<AuthError>> {
        let verifying_key = VerifyingKey::from_public_key_pem(pem.trim()).map_err(|e| {
            Report::new(AuthError::Configuration {
                message: format!("Failed to parse known public key PEM: {e}"),
            })
        })?;

        Ok(Self { verifying_key })
    }

    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }
}
