//! Exchange accounts

use std::sync::Arc;

use fireblocks_client::CustodyApi;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::{Field, ObjectSchema, Tool};

pub(super) fn tools(api: &Arc<dyn CustodyApi>) -> Vec<Tool> {
    vec![get_exchange_accounts(api.clone())]
}

/// Query for `GET /v1/exchange_accounts/paged`
#[derive(Debug, Deserialize, Serialize)]
struct GetExchangeAccountsArgs {
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<String>,
}

fn get_exchange_accounts(api: Arc<dyn CustodyApi>) -> Tool {
    let schema = ObjectSchema::strict()
        .field(
            "limit",
            Field::integer()
                .range(1, 5)
                .default(3)
                .describe("Number of exchanges per page (min: 1, max: 5, default: 3)"),
        )
        .field(
            "before",
            Field::string()
                .optional()
                .describe("Pagination cursor for results before this point"),
        )
        .field(
            "after",
            Field::string()
                .optional()
                .describe("Pagination cursor for results after this point"),
        );

    Tool::new(
        "get_exchange_accounts",
        "Get exchange accounts with pagination support",
        schema,
        move |args: GetExchangeAccountsArgs| {
            let api = api.clone();
            async move {
                let accounts = api.get_exchange_accounts(serde_json::to_value(&args)?).await?;
                Ok::<_, ToolError>(accounts)
            }
        },
    )
}
