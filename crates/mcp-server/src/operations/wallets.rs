//! Whitelisted external and internal wallets

use std::sync::Arc;

use fireblocks_client::CustodyApi;
use serde_json::Value;

use super::no_arguments;
use crate::error::ToolError;
use crate::tools::Tool;

pub(super) fn tools(api: &Arc<dyn CustodyApi>) -> Vec<Tool> {
    let external = api.clone();
    let internal = api.clone();

    vec![
        Tool::new(
            "get_external_wallets",
            "Get external wallets under the workspace",
            no_arguments(),
            move |_: Value| {
                let api = external.clone();
                async move { Ok::<_, ToolError>(api.get_external_wallets().await?) }
            },
        ),
        Tool::new(
            "get_internal_wallets",
            "Get internal wallets under the workspace",
            no_arguments(),
            move |_: Value| {
                let api = internal.clone();
                async move { Ok::<_, ToolError>(api.get_internal_wallets().await?) }
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::test_support::StubApi;
    use serde_json::json;

    #[tokio::test]
    async fn test_each_wallet_kind_hits_its_endpoint() {
        let stub = Arc::new(StubApi::returning(json!([])));
        let api: Arc<dyn CustodyApi> = stub.clone();
        let tools = tools(&api);

        for tool in &tools {
            tool.invoke(json!({})).await.unwrap();
        }

        let methods: Vec<&str> = stub.calls().into_iter().map(|(m, _)| m).collect();
        assert_eq!(methods, vec!["get_external_wallets", "get_internal_wallets"]);
    }
}
