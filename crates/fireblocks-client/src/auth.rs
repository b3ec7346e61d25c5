//! JWT request signing for the Fireblocks API
//!
//! Every request carries a short-lived RS256 token bound to the request URI
//! and a SHA-256 hash of the exact body bytes.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::PrivateKey;
use crate::error::{ClientError, ClientResult};

/// Token lifetime in seconds (the API rejects anything over 60)
const TOKEN_TTL_SECS: u64 = 55;

/// Claims signed into each request token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestClaims {
    pub uri: String,
    pub nonce: String,
    pub iat: u64,
    pub exp: u64,
    pub sub: String,
    #[serde(rename = "bodyHash")]
    pub body_hash: String,
}

/// Signs outgoing API requests
pub struct RequestSigner {
    api_key: String,
    key: EncodingKey,
}

impl RequestSigner {
    /// Create a signer from the API key and RSA private key
    pub fn new(api_key: &str, private_key: &PrivateKey) -> ClientResult<Self> {
        let key = EncodingKey::from_rsa_pem(private_key.expose().as_bytes())
            .map_err(|e| ClientError::PrivateKey(format!("Invalid RSA private key: {}", e)))?;

        Ok(Self {
            api_key: api_key.to_string(),
            key,
        })
    }

    /// API key this signer authenticates as
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Build the claims for a request
    pub fn claims(&self, uri: &str, body: &[u8]) -> RequestClaims {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        RequestClaims {
            uri: uri.to_string(),
            nonce: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + TOKEN_TTL_SECS,
            sub: self.api_key.clone(),
            body_hash: body_hash(body),
        }
    }

    /// Sign a request for `uri` (path and query) with the given body bytes
    pub fn sign(&self, uri: &str, body: &[u8]) -> ClientResult<String> {
        let claims = self.claims(uri, body);
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.key,
        )?)
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("api_key", &self.api_key)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Hex-encoded SHA-256 of the request body
pub fn body_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/test_private_key.pem");
    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/test_public_key.pem");

    #[test]
    fn test_empty_body_hash() {
        assert_eq!(
            body_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sign_round_trip_claims() {
        let signer = RequestSigner::new("api-key-1", &PrivateKey::from_pem(PRIVATE_KEY)).unwrap();
        let token = signer.sign("/v1/vault/accounts_paged?limit=1", b"").unwrap();

        let decoded = jsonwebtoken::decode::<RequestClaims>(
            &token,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &Validation::new(Algorithm::RS256),
        )
        .unwrap();

        assert_eq!(decoded.claims.uri, "/v1/vault/accounts_paged?limit=1");
        assert_eq!(decoded.claims.sub, "api-key-1");
        assert_eq!(decoded.claims.exp - decoded.claims.iat, TOKEN_TTL_SECS);
        assert_eq!(decoded.claims.body_hash, body_hash(b""));
    }

    #[test]
    fn test_nonce_is_unique() {
        let signer = RequestSigner::new("k", &PrivateKey::from_pem(PRIVATE_KEY)).unwrap();
        let a = signer.claims("/v1/users", b"");
        let b = signer.claims("/v1/users", b"");
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_invalid_key_rejected() {
        let err = RequestSigner::new("k", &PrivateKey::from_pem("not a key")).unwrap_err();
        assert!(matches!(err, ClientError::PrivateKey(_)));
    }
}
