//! Fireblocks MCP Server CLI
//!
//! Reads credentials and transport settings from the command line or the
//! environment, checks connectivity to the Fireblocks API and serves the
//! registered tools until the transport ends or a shutdown signal arrives.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use fireblocks_client::{CustodyApi, FireblocksClient};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fireblocks_mcp::{build_dispatcher, Cli, McpServer};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the stdio protocol, so logs always go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_directive())),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to start server: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.client_config()?;
    let api: Arc<dyn CustodyApi> = Arc::new(FireblocksClient::new(config)?);

    match api.test_connection().await {
        Ok(()) => info!("Connected to Fireblocks API"),
        Err(e) => warn!("Fireblocks connectivity check failed: {}", e),
    }

    if cli.enable_write_operations {
        warn!("Write operations are enabled");
    }

    let dispatcher = build_dispatcher(api, cli.enable_write_operations)?;
    let server = McpServer::new(Arc::new(dispatcher)).with_mode(cli.server_mode());

    server.run(shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
