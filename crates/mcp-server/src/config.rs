//! Command-line and environment configuration

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use fireblocks_client::{ClientConfig, ClientResult, PrivateKey};

use crate::server::ServerMode;
use crate::transport::HttpConfig;

/// Transport binding selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportKind {
    /// Newline-delimited JSON-RPC over stdin/stdout
    #[default]
    Stdio,
    /// Single-connection Server-Sent Events
    Sse,
    /// Session-multiplexed streamable HTTP
    #[value(alias = "streamable-http")]
    Http,
}

/// Fireblocks MCP Server - exposes the Fireblocks API as MCP tools
#[derive(Parser, Debug, Clone)]
#[command(name = "fireblocks-mcp-server")]
#[command(version)]
#[command(about = "MCP server for the Fireblocks custody API")]
pub struct Cli {
    /// Transport binding
    #[arg(
        value_enum,
        env = "MCP_TRANSPORT_TYPE",
        default_value = "stdio",
        ignore_case = true
    )]
    pub transport: TransportKind,

    /// Fireblocks API key
    #[arg(long, env = "FIREBLOCKS_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Path to the RSA private key (PEM) used to sign API requests
    #[arg(long, env = "FIREBLOCKS_PRIVATE_KEY_PATH")]
    pub private_key_path: Option<PathBuf>,

    /// Name of an environment variable holding the PEM private key
    #[arg(long, env = "FIREBLOCKS_PRIVATE_KEY_ENV_NAME")]
    pub private_key_env_name: Option<String>,

    /// Fireblocks API base URL (e.g. https://api.fireblocks.io/v1)
    #[arg(long, env = "FIREBLOCKS_API_BASE_URL")]
    pub base_url: String,

    /// Register operations that create transactions ("true" or "1")
    #[arg(
        long,
        env = "ENABLE_WRITE_OPERATIONS",
        value_parser = parse_enabled,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub enable_write_operations: bool,

    /// Log verbosity: debug, info, warn or error
    #[arg(long, env = "LOGGER_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Listen address for the HTTP transports
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Listen port for the HTTP transports
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Allowed CORS origin for the streamable HTTP transport
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,
}

/// Only the exact values `true` and `1` enable a switch
fn parse_enabled(value: &str) -> Result<bool, String> {
    Ok(matches!(value.trim(), "true" | "1"))
}

impl Cli {
    /// `tracing` filter directive for the configured level; unknown levels fall back to `info`
    pub fn log_directive(&self) -> &'static str {
        match self.log_level.trim().to_ascii_lowercase().as_str() {
            "debug" => "debug",
            "warn" => "warn",
            "error" => "error",
            _ => "info",
        }
    }

    /// Resolve credentials and build the upstream client configuration
    pub fn client_config(&self) -> ClientResult<ClientConfig> {
        let private_key = PrivateKey::resolve(
            self.private_key_path.as_deref(),
            self.private_key_env_name.as_deref(),
        )?;
        ClientConfig::new(&self.api_key, private_key, &self.base_url)
    }

    pub fn server_mode(&self) -> ServerMode {
        match self.transport {
            TransportKind::Stdio => ServerMode::Stdio,
            TransportKind::Sse => ServerMode::Sse {
                host: self.host.clone(),
                port: self.port,
            },
            TransportKind::Http => ServerMode::Http(HttpConfig {
                host: self.host.clone(),
                port: self.port,
                cors_origin: self.cors_origin.clone(),
            }),
        }
    }
}
