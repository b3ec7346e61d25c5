//! Client configuration and credential loading
//!
//! The private key is read either from a PEM file or from an environment
//! variable whose *name* is configured, never from a fixed variable.

use std::path::Path;

use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{ClientError, ClientResult};

/// RSA private key used to sign API requests - automatically zeroed when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    pem: String,
}

impl PrivateKey {
    /// Create a private key from PEM text.
    ///
    /// Literal `\n` escape sequences (common when keys are pasted into
    /// environment variables) are turned into real newlines.
    pub fn from_pem(pem: &str) -> Self {
        Self {
            pem: pem.split(r"\n").collect::<Vec<_>>().join("\n"),
        }
    }

    /// Resolve the private key from a file path or a named environment variable
    pub fn resolve(path: Option<&Path>, env_name: Option<&str>) -> ClientResult<Self> {
        Self::resolve_with(path, env_name, |name| std::env::var(name).ok())
    }

    /// Resolve the private key with a custom environment lookup
    pub fn resolve_with<F>(path: Option<&Path>, env_name: Option<&str>, lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = path {
            let pem = std::fs::read_to_string(path).map_err(|e| {
                ClientError::PrivateKey(format!(
                    "Failed to read private key from file: {}. Error: {}",
                    path.display(),
                    e
                ))
            })?;
            return Ok(Self::from_pem(&pem));
        }

        match env_name {
            Some(name) => match lookup(name) {
                Some(pem) if !pem.is_empty() => Ok(Self::from_pem(&pem)),
                _ => Err(ClientError::PrivateKey(format!(
                    "FIREBLOCKS_PRIVATE_KEY_ENV_NAME environment variable is set to {} but this environment variable is empty",
                    name
                ))),
            },
            None => Err(ClientError::PrivateKey(
                "Either FIREBLOCKS_PRIVATE_KEY_PATH or FIREBLOCKS_PRIVATE_KEY_ENV_NAME must be set"
                    .to_string(),
            )),
        }
    }

    /// Get the PEM text (use carefully)
    pub fn expose(&self) -> &str {
        &self.pem
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("pem", &"[REDACTED]")
            .finish()
    }
}

/// Connection settings for the Fireblocks API
#[derive(Debug)]
pub struct ClientConfig {
    /// API key (sent as `X-API-Key` and as the JWT subject)
    pub api_key: String,
    /// Private key for request signing
    pub private_key: PrivateKey,
    /// API base URL, e.g. `https://api.fireblocks.io/v1`
    pub base_url: Url,
}

impl ClientConfig {
    /// Build a configuration, validating required values
    pub fn new(api_key: &str, private_key: PrivateKey, base_url: &str) -> ClientResult<Self> {
        if api_key.trim().is_empty() {
            return Err(ClientError::Config(
                "FIREBLOCKS_API_KEY environment variable is required".to_string(),
            ));
        }
        if base_url.trim().is_empty() {
            return Err(ClientError::Config(
                "FIREBLOCKS_API_BASE_URL environment variable is required".to_string(),
            ));
        }

        let mut base_url = Url::parse(base_url.trim())?;
        // Joining relative paths needs a trailing slash on the base
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            api_key: api_key.to_string(),
            private_key,
            base_url,
        })
    }
}
