//! Transaction authorization policy

use std::sync::Arc;

use fireblocks_client::CustodyApi;
use serde_json::Value;

use super::no_arguments;
use crate::error::ToolError;
use crate::tools::Tool;

pub(super) fn tools(api: &Arc<dyn CustodyApi>) -> Vec<Tool> {
    let api = api.clone();
    vec![Tool::new(
        "get_active_policy",
        "Get the active policy and its validation. Note: This endpoint is currently in beta and might be subject to changes.",
        no_arguments(),
        move |_: Value| {
            let api = api.clone();
            async move { Ok::<_, ToolError>(api.get_active_policy().await?) }
        },
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::test_support::StubApi;
    use crate::tools::ToolOutput;
    use serde_json::json;

    #[tokio::test]
    async fn test_policy_passed_through() {
        let policy = json!({ "policy": { "rules": [] }, "validation": { "status": "VALID" } });
        let api: Arc<dyn CustodyApi> = Arc::new(StubApi::returning(policy.clone()));

        let output = tools(&api)[0].invoke(json!({})).await.unwrap();
        assert_eq!(output, ToolOutput::Json(policy));
    }
}
