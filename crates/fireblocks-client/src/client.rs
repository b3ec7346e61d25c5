//! Fireblocks REST client
//!
//! Each call is a thin pass-through: arguments go out as query parameters or
//! a JSON body, and the decoded JSON response comes back untouched.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use crate::auth::RequestSigner;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Operations the MCP server needs from the custody platform.
///
/// Implemented by [`FireblocksClient`]; tests substitute their own stubs.
#[async_trait]
pub trait CustodyApi: Send + Sync {
    async fn get_transactions(&self, query: Value) -> ClientResult<Value>;
    async fn create_transaction(&self, body: Value) -> ClientResult<Value>;
    async fn get_vault_accounts(&self, query: Value) -> ClientResult<Value>;
    async fn get_vault_account(&self, vault_account_id: &str) -> ClientResult<Value>;
    async fn get_vault_account_asset(&self, vault_account_id: &str, asset_id: &str) -> ClientResult<Value>;
    async fn get_vault_assets(&self, query: Value) -> ClientResult<Value>;
    async fn get_vault_balance_by_asset(&self, asset_id: &str) -> ClientResult<Value>;
    async fn get_exchange_accounts(&self, query: Value) -> ClientResult<Value>;
    async fn get_network_connections(&self) -> ClientResult<Value>;
    async fn get_active_policy(&self) -> ClientResult<Value>;
    async fn get_blockchains(&self) -> ClientResult<Value>;
    async fn get_blockchain_asset(&self, id: &str) -> ClientResult<Value>;
    async fn get_assets(&self, query: Value) -> ClientResult<Value>;
    async fn get_whitelist_ip_addresses(&self, user_id: &str) -> ClientResult<Value>;
    async fn get_external_wallets(&self) -> ClientResult<Value>;
    async fn get_internal_wallets(&self) -> ClientResult<Value>;
    async fn get_users(&self) -> ClientResult<Value>;

    /// Verify credentials by fetching a single vault account
    async fn test_connection(&self) -> ClientResult<()> {
        match self
            .get_vault_accounts(serde_json::json!({ "limit": 1 }))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let status = e.status().map(|s| s.to_string()).unwrap_or_default();
                Err(ClientError::Config(format!(
                    "Failed to connect to Fireblocks API: {} {}",
                    status, e
                )))
            }
        }
    }
}

/// reqwest-backed Fireblocks API client
pub struct FireblocksClient {
    /// HTTP client
    client: Client,
    /// API base URL (always ends with '/')
    base_url: Url,
    /// Request signer
    signer: RequestSigner,
}

impl FireblocksClient {
    /// Create a new client from configuration
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let signer = RequestSigner::new(&config.api_key, &config.private_key)?;

        Ok(Self {
            client,
            base_url: config.base_url,
            signer,
        })
    }

    /// Send a signed request and decode the JSON response
    async fn request(
        &self,
        method: Method,
        segments: &[&str],
        query: Option<&Value>,
        body: Option<&Value>,
    ) -> ClientResult<Value> {
        let url = build_url(&self.base_url, segments, query)?;
        let uri = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };

        let body_bytes = match body {
            Some(body) => serde_json::to_vec(body)?,
            None => Vec::new(),
        };
        let token = self.signer.sign(&uri, &body_bytes)?;

        debug!("Executing {} {}", method, uri);

        let mut request = self
            .client
            .request(method.clone(), url)
            .header("X-API-Key", self.signer.api_key())
            .header("Authorization", format!("Bearer {}", token));

        if body.is_some() {
            request = request
                .header("Content-Type", "application/json")
                .body(body_bytes);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        debug!("Response status: {}", status);

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }

        let message = error_message(&text)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        error!("Request {} {} failed with status {}: {}", method, uri, status, message);

        Err(ClientError::api(status.as_u16(), message))
    }

    async fn get(&self, segments: &[&str], query: Option<&Value>) -> ClientResult<Value> {
        self.request(Method::GET, segments, query, None).await
    }
}

#[async_trait]
impl CustodyApi for FireblocksClient {
    async fn get_transactions(&self, query: Value) -> ClientResult<Value> {
        self.get(&["transactions"], Some(&query)).await
    }

    async fn create_transaction(&self, body: Value) -> ClientResult<Value> {
        self.request(Method::POST, &["transactions"], None, Some(&body))
            .await
    }

    async fn get_vault_accounts(&self, query: Value) -> ClientResult<Value> {
        self.get(&["vault", "accounts_paged"], Some(&query)).await
    }

    async fn get_vault_account(&self, vault_account_id: &str) -> ClientResult<Value> {
        self.get(&["vault", "accounts", vault_account_id], None).await
    }

    async fn get_vault_account_asset(&self, vault_account_id: &str, asset_id: &str) -> ClientResult<Value> {
        self.get(&["vault", "accounts", vault_account_id, asset_id], None)
            .await
    }

    async fn get_vault_assets(&self, query: Value) -> ClientResult<Value> {
        self.get(&["vault", "assets"], Some(&query)).await
    }

    async fn get_vault_balance_by_asset(&self, asset_id: &str) -> ClientResult<Value> {
        self.get(&["vault", "assets", asset_id], None).await
    }

    async fn get_exchange_accounts(&self, query: Value) -> ClientResult<Value> {
        self.get(&["exchange_accounts", "paged"], Some(&query)).await
    }

    async fn get_network_connections(&self) -> ClientResult<Value> {
        self.get(&["network_connections"], None).await
    }

    async fn get_active_policy(&self) -> ClientResult<Value> {
        self.get(&["tap", "active_policy"], None).await
    }

    async fn get_blockchains(&self) -> ClientResult<Value> {
        self.get(&["blockchains"], None).await
    }

    async fn get_blockchain_asset(&self, id: &str) -> ClientResult<Value> {
        self.get(&["assets", id], None).await
    }

    async fn get_assets(&self, query: Value) -> ClientResult<Value> {
        self.get(&["assets"], Some(&query)).await
    }

    async fn get_whitelist_ip_addresses(&self, user_id: &str) -> ClientResult<Value> {
        self.get(
            &["management", "api_users", user_id, "whitelist_ip_addresses"],
            None,
        )
        .await
    }

    async fn get_external_wallets(&self) -> ClientResult<Value> {
        self.get(&["external_wallets"], None).await
    }

    async fn get_internal_wallets(&self) -> ClientResult<Value> {
        self.get(&["internal_wallets"], None).await
    }

    async fn get_users(&self) -> ClientResult<Value> {
        self.get(&["users"], None).await
    }
}

/// Build a request URL from percent-encoded path segments and query arguments
fn build_url(base: &Url, segments: &[&str], query: Option<&Value>) -> ClientResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::Config(format!("Base URL cannot be a base: {}", base)))?
        .pop_if_empty()
        .extend(segments);

    let pairs = query.map(query_pairs).unwrap_or_default();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    Ok(url)
}

/// Flatten an arguments object into query pairs.
///
/// Arrays become repeated keys; nulls are skipped.
fn query_pairs(query: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let Some(map) = query.as_object() else {
        return pairs;
    };

    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    if let Some(s) = scalar_to_string(item) {
                        pairs.push((key.clone(), s));
                    }
                }
            }
            other => {
                if let Some(s) = scalar_to_string(other) {
                    pairs.push((key.clone(), s));
                }
            }
        }
    }

    pairs
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Extract the `message` field from an API error body, falling back to the raw text
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(json) => json
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(trimmed.to_string())),
        Err(_) => Some(trimmed.to_string()),
    }
}
