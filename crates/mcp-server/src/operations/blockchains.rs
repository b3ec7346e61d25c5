//! Supported blockchains and assets

use std::sync::Arc;

use fireblocks_client::CustodyApi;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::no_arguments;
use crate::error::ToolError;
use crate::tools::{Field, ObjectSchema, Schema, Tool};

pub(super) fn tools(api: &Arc<dyn CustodyApi>) -> Vec<Tool> {
    vec![
        get_blockchains(api.clone()),
        get_blockchain_asset(api.clone()),
        get_assets(api.clone()),
    ]
}

fn get_blockchains(api: Arc<dyn CustodyApi>) -> Tool {
    Tool::new(
        "get_blockchains",
        "Get all blockchains supported by Fireblocks",
        no_arguments(),
        move |_: Value| {
            let api = api.clone();
            async move { Ok::<_, ToolError>(api.get_blockchains().await?) }
        },
    )
}

#[derive(Debug, Deserialize)]
struct BlockchainAssetArgs {
    id: String,
}

fn get_blockchain_asset(api: Arc<dyn CustodyApi>) -> Tool {
    let schema = ObjectSchema::strict().field(
        "id",
        Field::string().describe("The ID or legacyId of the blockchain asset"),
    );

    Tool::new(
        "get_blockchain_asset",
        "Get a specific blockchain asset by ID or legacyId",
        schema,
        move |args: BlockchainAssetArgs| {
            let api = api.clone();
            async move {
                let asset = api.get_blockchain_asset(&args.id).await?;
                Ok::<_, ToolError>(asset)
            }
        },
    )
}

/// Query filters for `GET /v1/assets`
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetAssetsArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    blockchain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    asset_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deprecated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_cursor: Option<String>,
    page_size: u32,
}

fn get_assets(api: Arc<dyn CustodyApi>) -> Tool {
    let schema = ObjectSchema::strict()
        .field(
            "blockchainId",
            Field::string().optional().describe("Blockchain id of the assets"),
        )
        .field(
            "assetClass",
            Field::one_of(&["NATIVE", "FT", "FIAT", "NFT", "SFT"])
                .optional()
                .describe("Assets class"),
        )
        .field("symbol", Field::string().optional().describe("Assets onchain symbol"))
        .field(
            "scope",
            Field::one_of(&["GLOBAL", "LOCAL"])
                .optional()
                .describe("Scope of the assets"),
        )
        .field("deprecated", Field::boolean().optional().describe("Are assets deprecated"))
        .field(
            "ids",
            Field::array(Schema::String)
                .max_items(100)
                .optional()
                .describe("A list of asset IDs (max 100)"),
        )
        .field("pageCursor", Field::string().optional().describe("Next page cursor to fetch"))
        .field(
            "pageSize",
            Field::integer()
                .range(100, 1000)
                .default(500)
                .describe("Items per page"),
        );

    Tool::new(
        "get_assets",
        "Get assets supported by Fireblocks with filtering options",
        schema,
        move |args: GetAssetsArgs| {
            let api = api.clone();
            async move {
                let assets = api.get_assets(serde_json::to_value(&args)?).await?;
                Ok::<_, ToolError>(assets)
            }
        },
    )
}
