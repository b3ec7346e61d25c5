//! IP whitelists of API users

use std::sync::Arc;

use fireblocks_client::CustodyApi;
use serde::Deserialize;

use crate::error::ToolError;
use crate::tools::{Field, ObjectSchema, Tool};

pub(super) fn tools(api: &Arc<dyn CustodyApi>) -> Vec<Tool> {
    vec![get_whitelist_ip_addresses(api.clone())]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WhitelistArgs {
    user_id: String,
}

fn get_whitelist_ip_addresses(api: Arc<dyn CustodyApi>) -> Tool {
    let schema = ObjectSchema::strict().field("userId", Field::string().describe("The ID of the API user"));

    Tool::new(
        "get_whitelist_ip_addresses",
        "Get whitelisted IP addresses for a given API user",
        schema,
        move |args: WhitelistArgs| {
            let api = api.clone();
            async move {
                let addresses = api.get_whitelist_ip_addresses(&args.user_id).await?;
                Ok::<_, ToolError>(addresses)
            }
        },
    )
}
