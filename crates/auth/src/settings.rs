use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::Deserialize;
use validator::Validate;

use crate::constants::DEFAULT_BASE_URL;
use crate::error::AuthError;

/// Prefix for environment overrides, e.g. `COINAPULT__AUTH__SECRET`.
pub const ENVIRONMENT_PREFIX: &str = "COINAPULT";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    #[validate(url)]
    pub base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Credential material for the selected authentication method.
#[derive(Clone, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum AuthSettings {
    Hmac {
        key: String,
        secret: String,
    },
    Ecc {
        private_key_pem: String,
        #[serde(default)]
        public_key_pem: Option<String>,
        /// Overrides the built-in service key used to verify responses.
        #[serde(default)]
        known_public_key_pem: Option<String>,
    },
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hmac { key, .. } => f
                .debug_struct("Hmac")
                .field("key", key)
                .field("secret", &"<redacted>")
                .finish(),
            Self::Ecc {
                public_key_pem,
                known_public_key_pem,
                ..
            } => f
                .debug_struct("Ecc")
                .field("private_key_pem", &"<redacted>")
                .field("public_key_pem", public_key_pem)
                .field("known_public_key_pem", known_public_key_pem)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    #[serde(default)]
    #[validate(nested)]
    pub api: ApiSettings,
    pub auth: AuthSettings,
}

impl Settings {
    /// Loads settings from TOML text, applying `COINAPULT__*` environment
    /// overrides on top.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the TOML cannot be parsed, the
    /// result does not describe a complete configuration, or validation fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<AuthError>> {
        let environment = Environment::default()
            .prefix(ENVIRONMENT_PREFIX)
            .separator("__");

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(AuthError::Configuration {
                message: "Failed to build configuration".to_string(),
            })?;

        let settings: Self = config
            .try_deserialize()
            .change_context(AuthError::Configuration {
                message: "Failed to deserialize configuration".to_string(),
            })?;

        settings
            .validate()
            .change_context(AuthError::Configuration {
                message: "Settings validation failed".to_string(),
            })?;

        Ok(settings)
    }
}
