//! Vault accounts, vault assets and balances

use std::sync::Arc;

use fireblocks_client::CustodyApi;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::count;
use crate::error::ToolError;
use crate::tools::{Field, ObjectSchema, Tool};

pub(super) fn tools(api: &Arc<dyn CustodyApi>) -> Vec<Tool> {
    vec![
        get_vault_accounts(api.clone()),
        get_vault_account_by_id(api.clone()),
        get_vault_account_asset(api.clone()),
        get_vault_assets(api.clone()),
        get_vault_balance_by_asset(api.clone()),
    ]
}

/// Query filters for `GET /v1/vault/accounts_paged`
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetVaultAccountsArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    name_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name_suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_amount_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    asset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<String>,
    limit: u32,
}

fn get_vault_accounts(api: Arc<dyn CustodyApi>) -> Tool {
    let schema = ObjectSchema::strict()
        .field(
            "namePrefix",
            Field::string()
                .optional()
                .describe("Filter vault accounts by name prefix"),
        )
        .field(
            "nameSuffix",
            Field::string()
                .optional()
                .describe("Filter vault accounts by name suffix"),
        )
        .field(
            "minAmountThreshold",
            Field::number().optional().describe(
                "Specifying minAmountThreshold will filter accounts with balances greater than this value, otherwise, it will return all accounts",
            ),
        )
        .field(
            "assetId",
            Field::string().optional().describe("Filter vault accounts by asset ID"),
        )
        .field(
            "orderBy",
            Field::one_of(&["ASC", "DESC"])
                .optional()
                .describe("The direction to order the results by. Default is DESC"),
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
        )
        .field(
            "limit",
            Field::integer().range(1, 200).default(50).describe(
                "Limits the number of results. If not provided, a limit of 50 will be used. The maximum allowed limit is 200",
            ),
        );

    Tool::new(
        "get_vault_accounts",
        "Get Fireblocks vault accounts with optional filtering",
        schema,
        move |args: GetVaultAccountsArgs| {
            let api = api.clone();
            async move {
                let page = api.get_vault_accounts(serde_json::to_value(&args)?).await?;
                let accounts = page.get("accounts").cloned().unwrap_or_else(|| json!([]));

                Ok::<_, ToolError>(json!({
                    "count": count(&accounts),
                    "vaultAccounts": accounts,
                    "paging": page.get("paging").cloned().unwrap_or(Value::Null),
                }))
            }
        },
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VaultAccountArgs {
    vault_account_id: String,
}

fn get_vault_account_by_id(api: Arc<dyn CustodyApi>) -> Tool {
    let schema = ObjectSchema::strict().field(
        "vaultAccountId",
        Field::string().describe("The vault account ID"),
    );

    Tool::new(
        "get_vault_account_by_id",
        "Get a specific vault account by its ID",
        schema,
        move |args: VaultAccountArgs| {
            let api = api.clone();
            async move {
                let account = api.get_vault_account(&args.vault_account_id).await?;
                Ok::<_, ToolError>(account)
            }
        },
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VaultAccountAssetArgs {
    vault_account_id: String,
    asset_id: String,
}

fn get_vault_account_asset(api: Arc<dyn CustodyApi>) -> Tool {
    let schema = ObjectSchema::strict()
        .field(
            "vaultAccountId",
            Field::string().describe("The ID of the vault account to return"),
        )
        .field("assetId", Field::string().describe("The ID of the asset"));

    Tool::new(
        "get_vault_account_asset",
        "Get the asset balance for a specific vault account and asset",
        schema,
        move |args: VaultAccountAssetArgs| {
            let api = api.clone();
            async move {
                let asset = api
                    .get_vault_account_asset(&args.vault_account_id, &args.asset_id)
                    .await?;
                Ok::<_, ToolError>(asset)
            }
        },
    )
}

/// Query filters for `GET /v1/vault/assets`
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetVaultAssetsArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    account_name_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_name_suffix: Option<String>,
}

fn get_vault_assets(api: Arc<dyn CustodyApi>) -> Tool {
    let schema = ObjectSchema::strict()
        .field(
            "accountNamePrefix",
            Field::string()
                .optional()
                .describe("Filter vault accounts by name prefix"),
        )
        .field(
            "accountNameSuffix",
            Field::string()
                .optional()
                .describe("Filter vault accounts by name suffix"),
        );

    Tool::new(
        "get_vault_assets",
        "Get asset balance for chosen assets",
        schema,
        move |args: GetVaultAssetsArgs| {
            let api = api.clone();
            async move {
                let assets = match api.get_vault_assets(serde_json::to_value(&args)?).await? {
                    Value::Null => json!([]),
                    assets => assets,
                };

                Ok::<_, ToolError>(json!({
                    "count": count(&assets),
                    "vaultAssets": assets,
                }))
            }
        },
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetArgs {
    asset_id: String,
}

fn get_vault_balance_by_asset(api: Arc<dyn CustodyApi>) -> Tool {
    let schema = ObjectSchema::strict().field("assetId", Field::string().describe("The ID of the asset"));

    Tool::new(
        "get_vault_balance_by_asset",
        "Get the vault balance summary for an asset",
        schema,
        move |args: AssetArgs| {
            let api = api.clone();
            async move {
                let balance = api.get_vault_balance_by_asset(&args.asset_id).await?;
                Ok::<_, ToolError>(balance)
            }
        },
    )
}
