//! Integration tests for the MCP server.
//!
//! Drive the public API end to end against an in-memory custody backend:
//! tool dispatch, the stdio loop, the SSE message endpoint and the
//! streamable HTTP session lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use fireblocks_client::{ClientResult, CustodyApi};
use fireblocks_mcp::protocol::ToolContent;
use fireblocks_mcp::transport::{MESSAGES_PATH, SESSION_ID_HEADER};
use fireblocks_mcp::{
    build_dispatcher, Dispatcher, HttpConfig, SseTransport, StdioTransport, StreamableHttpTransport,
};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

/// In-memory custody backend that counts every upstream call
#[derive(Default)]
struct FakeCustody {
    calls: AtomicUsize,
}

impl FakeCustody {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, value: Value) -> ClientResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }
}

#[async_trait]
impl CustodyApi for FakeCustody {
    async fn get_transactions(&self, _query: Value) -> ClientResult<Value> {
        self.answer(json!([]))
    }
    async fn create_transaction(&self, _body: Value) -> ClientResult<Value> {
        self.answer(json!({ "id": "tx-1", "status": "SUBMITTED" }))
    }
    async fn get_vault_accounts(&self, _query: Value) -> ClientResult<Value> {
        self.answer(json!({
            "accounts": [
                { "id": "0", "name": "Treasury" },
                { "id": "1", "name": "Operations" }
            ],
            "paging": { "after": "1" }
        }))
    }
    async fn get_vault_account(&self, vault_account_id: &str) -> ClientResult<Value> {
        self.answer(json!({ "id": vault_account_id }))
    }
    async fn get_vault_account_asset(&self, _vault_account_id: &str, asset_id: &str) -> ClientResult<Value> {
        self.answer(json!({ "id": asset_id, "total": "1.5" }))
    }
    async fn get_vault_assets(&self, _query: Value) -> ClientResult<Value> {
        self.answer(json!([]))
    }
    async fn get_vault_balance_by_asset(&self, asset_id: &str) -> ClientResult<Value> {
        self.answer(json!({ "id": asset_id }))
    }
    async fn get_exchange_accounts(&self, _query: Value) -> ClientResult<Value> {
        self.answer(json!({ "exchangeAccounts": [] }))
    }
    async fn get_network_connections(&self) -> ClientResult<Value> {
        self.answer(json!([]))
    }
    async fn get_active_policy(&self) -> ClientResult<Value> {
        self.answer(json!({ "rules": [] }))
    }
    async fn get_blockchains(&self) -> ClientResult<Value> {
        self.answer(json!([]))
    }
    async fn get_blockchain_asset(&self, id: &str) -> ClientResult<Value> {
        self.answer(json!({ "id": id }))
    }
    async fn get_assets(&self, _query: Value) -> ClientResult<Value> {
        self.answer(json!({ "data": [] }))
    }
    async fn get_whitelist_ip_addresses(&self, user_id: &str) -> ClientResult<Value> {
        self.answer(json!({ "userId": user_id, "whitelistedIps": [] }))
    }
    async fn get_external_wallets(&self) -> ClientResult<Value> {
        self.answer(json!([]))
    }
    async fn get_internal_wallets(&self) -> ClientResult<Value> {
        self.answer(json!([]))
    }
    async fn get_users(&self) -> ClientResult<Value> {
        self.answer(json!([
            { "id": "u1", "firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com" },
            { "id": "u2", "firstName": "Alan", "lastName": "Turing", "email": "alan@example.com" }
        ]))
    }
}

fn dispatcher(backend: Arc<FakeCustody>, allow_writes: bool) -> Arc<Dispatcher> {
    Arc::new(build_dispatcher(backend, allow_writes).unwrap())
}

fn text_of(content: &[ToolContent]) -> &str {
    match &content[0] {
        ToolContent::Text { text } => text,
    }
}

async fn json_body(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, session_id: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header("content-type", "application/json");
    if let Some(id) = session_id {
        builder = builder.header(SESSION_ID_HEADER, id);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn test_vault_accounts_are_wrapped_with_count() {
    let backend = Arc::new(FakeCustody::default());
    let dispatcher = dispatcher(backend.clone(), false);

    let result = dispatcher
        .call_tool("get_vault_accounts", Some(json!({ "limit": 10 })))
        .await
        .unwrap();
    assert!(!result.is_error);

    let body: Value = serde_json::from_str(text_of(&result.content)).unwrap();
    assert_eq!(body["count"], json!(2));
    assert_eq!(body["vaultAccounts"][0]["id"], json!("0"));
    assert_eq!(body["vaultAccounts"][1]["id"], json!("1"));
    assert_eq!(body["paging"], json!({ "after": "1" }));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_create_transaction_returns_upstream_object() {
    let dispatcher = dispatcher(Arc::new(FakeCustody::default()), true);

    let result = dispatcher
        .call_tool(
            "create_transaction",
            Some(json!({
                "assetId": "BTC",
                "amount": "0.01",
                "source": { "type": "VAULT_ACCOUNT", "id": "0" },
                "destination": { "type": "VAULT_ACCOUNT", "id": "1" }
            })),
        )
        .await
        .unwrap();

    let expected = serde_json::to_string_pretty(&json!({ "id": "tx-1", "status": "SUBMITTED" })).unwrap();
    assert_eq!(text_of(&result.content), expected);
}

#[tokio::test]
async fn test_create_transaction_hidden_without_writes() {
    let backend = Arc::new(FakeCustody::default());
    let dispatcher = dispatcher(backend.clone(), false);

    let err = dispatcher
        .call_tool("create_transaction", Some(json!({ "assetId": "BTC" })))
        .await
        .unwrap_err();
    assert_eq!(err.code, -32603);
    assert_eq!(err.message, "Tool not found: create_transaction");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_user_search_filters_by_name() {
    let dispatcher = dispatcher(Arc::new(FakeCustody::default()), false);

    let result = dispatcher
        .call_tool("get_users", Some(json!({ "query": "turing" })))
        .await
        .unwrap();

    let users: Value = serde_json::from_str(text_of(&result.content)).unwrap();
    assert_eq!(users.as_array().unwrap().len(), 1);
    assert_eq!(users[0]["id"], json!("u2"));
}

// =============================================================================
// stdio
// =============================================================================

#[tokio::test]
async fn test_stdio_session() {
    let (mut client_in, server_in) = tokio::io::duplex(64 * 1024);
    let (server_out, mut client_out) = tokio::io::duplex(64 * 1024);

    let mut transport = StdioTransport::new(dispatcher(Arc::new(FakeCustody::default()), false));
    let server = tokio::spawn(async move { transport.serve(server_in, server_out).await });

    let input = [
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": { "protocolVersion": "2024-11-05", "capabilities": {},
                        "clientInfo": { "name": "test-client", "version": "1.0.0" } }
        }),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
        json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                "params": { "name": "get_vault_account_by_id", "arguments": { "vaultAccountId": "7" } } }),
    ];
    for message in &input {
        client_in
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .unwrap();
    }
    drop(client_in);

    let mut output = String::new();
    client_out.read_to_string(&mut output).await.unwrap();
    server.await.unwrap().unwrap();

    let responses: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(responses.len(), 3);

    assert_eq!(responses[0]["id"], json!(1));
    assert_eq!(responses[0]["result"]["protocolVersion"], json!("2024-11-05"));
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], json!("Fireblocks MCP Server"));

    assert_eq!(responses[1]["id"], json!(2));
    assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 16);

    assert_eq!(responses[2]["id"], json!(3));
    assert_eq!(responses[2]["result"]["isError"], json!(false));
    let account: Value =
        serde_json::from_str(responses[2]["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(account, json!({ "id": "7" }));
}

// =============================================================================
// SSE
// =============================================================================

#[tokio::test]
async fn test_sse_message_without_stream_is_dropped() {
    let backend = Arc::new(FakeCustody::default());
    let transport = SseTransport::new(dispatcher(backend.clone(), false), "127.0.0.1", 0);

    let response = transport
        .router()
        .oneshot(post_json(
            MESSAGES_PATH,
            None,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/call",
                    "params": { "name": "get_users", "arguments": {} } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(backend.calls(), 0);
}

// =============================================================================
// Streamable HTTP
// =============================================================================

#[tokio::test]
async fn test_streamable_http_session_lifecycle() {
    let transport = StreamableHttpTransport::new(
        dispatcher(Arc::new(FakeCustody::default()), false),
        HttpConfig::default(),
    );
    let router = transport.router().unwrap();

    let response = router
        .clone()
        .oneshot(post_json(
            "/mcp",
            None,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize",
                    "params": { "protocolVersion": "2024-11-05", "capabilities": {} } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session_id = response
        .headers()
        .get(SESSION_ID_HEADER)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let body = json_body(response).await;
    assert_eq!(body["result"]["capabilities"], json!({ "tools": {} }));

    let response = router
        .clone()
        .oneshot(post_json(
            "/mcp",
            Some(&session_id),
            json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.headers().get(SESSION_ID_HEADER).unwrap(), session_id.as_str());
    let body = json_body(response).await;
    assert_eq!(body["result"]["tools"][0]["name"], json!("get_transactions"));

    let health = json_body(
        router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(health["activeSessions"], json!(1));

    let response = router
        .clone()
        .oneshot(
            Request::delete("/mcp")
                .header(SESSION_ID_HEADER, session_id.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "message": "Session terminated successfully" })
    );

    let health = json_body(
        router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(health["activeSessions"], json!(0));
    assert!(transport.sessions().is_empty());
}

#[tokio::test]
async fn test_streamable_http_batch_skips_notifications() {
    let transport = StreamableHttpTransport::new(
        dispatcher(Arc::new(FakeCustody::default()), false),
        HttpConfig::default(),
    );

    let response = transport
        .router()
        .unwrap()
        .oneshot(post_json(
            "/mcp",
            None,
            json!([
                { "jsonrpc": "2.0", "method": "notifications/initialized" },
                { "jsonrpc": "2.0", "id": "a", "method": "ping" },
                { "jsonrpc": "2.0", "id": "b", "method": "resources/list" }
            ]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let responses = body.as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], json!("a"));
    assert_eq!(responses[0]["result"], json!({}));
    assert_eq!(responses[1]["id"], json!("b"));
    assert_eq!(responses[1]["error"]["code"], json!(-32601));
}
