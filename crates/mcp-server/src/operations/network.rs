//! Network connections

use std::sync::Arc;

use fireblocks_client::CustodyApi;
use serde_json::Value;

use super::no_arguments;
use crate::error::ToolError;
use crate::tools::Tool;

pub(super) fn tools(api: &Arc<dyn CustodyApi>) -> Vec<Tool> {
    let api = api.clone();
    vec![Tool::new(
        "get_network_connections",
        "Get a list of network connections",
        no_arguments(),
        move |_: Value| {
            let api = api.clone();
            async move { Ok::<_, ToolError>(api.get_network_connections().await?) }
        },
    )]
}
