//! Fireblocks operations exposed as MCP tools
//!
//! Each submodule builds the tools for one area of the Fireblocks API. The
//! order of [`all`] is the order clients see in `tools/list`.

mod blockchains;
mod exchanges;
mod network;
mod policy;
mod transactions;
mod users;
mod vaults;
mod wallets;
mod whitelist;

use std::sync::Arc;

use fireblocks_client::CustodyApi;
use serde_json::Value;
use tracing::info;

use crate::tools::Tool;

/// Build every operation against `api`.
///
/// Mutating operations are left out entirely unless `allow_writes` is set,
/// so they are neither listed nor callable.
pub fn all(api: &Arc<dyn CustodyApi>, allow_writes: bool) -> Vec<Tool> {
    let tools: Vec<Tool> = [
        transactions::tools(api),
        vaults::tools(api),
        exchanges::tools(api),
        network::tools(api),
        policy::tools(api),
        blockchains::tools(api),
        whitelist::tools(api),
        wallets::tools(api),
        users::tools(api),
    ]
    .into_iter()
    .flatten()
    .collect();

    let total = tools.len();
    let tools: Vec<Tool> = tools
        .into_iter()
        .filter(|tool| allow_writes || !tool.is_mutating())
        .collect();

    if tools.len() < total {
        info!(
            "Write operations disabled; {} mutating tool(s) not registered",
            total - tools.len()
        );
    }

    tools
}

/// Length of a JSON array, zero for anything else
fn count(value: &Value) -> usize {
    value.as_array().map_or(0, Vec::len)
}

/// Schema for operations that take no arguments
fn no_arguments() -> crate::tools::ObjectSchema {
    crate::tools::ObjectSchema::strict()
}
