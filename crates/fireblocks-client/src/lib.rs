//! # fireblocks-client
//!
//! Thin client for the Fireblocks REST API used by the MCP server:
//! - Credential loading (API key + RSA private key from file or environment)
//! - JWT request signing
//! - The [`CustodyApi`] trait and its reqwest-backed [`FireblocksClient`]

pub mod auth;
mod client;
pub mod config;
pub mod error;

pub use auth::RequestSigner;
pub use client::{CustodyApi, FireblocksClient};
pub use config::{ClientConfig, PrivateKey};
pub use error::{ClientError, ClientResult};
