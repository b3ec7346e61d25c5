//! Transaction listing and creation

use std::sync::Arc;

use fireblocks_client::CustodyApi;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::count;
use crate::error::ToolError;
use crate::tools::{Field, ObjectSchema, Tool};

const SOURCE_TYPES: &[&str] = &[
    "VAULT_ACCOUNT",
    "EXCHANGE_ACCOUNT",
    "INTERNAL_WALLET",
    "EXTERNAL_WALLET",
    "CONTRACT",
    "FIAT_ACCOUNT",
    "NETWORK_CONNECTION",
    "COMPOUND",
    "UNKNOWN",
    "GAS_STATION",
    "END_USER_WALLET",
];

const DEST_TYPES: &[&str] = &[
    "VAULT_ACCOUNT",
    "EXCHANGE_ACCOUNT",
    "INTERNAL_WALLET",
    "EXTERNAL_WALLET",
    "CONTRACT",
    "FIAT_ACCOUNT",
    "NETWORK_CONNECTION",
    "COMPOUND",
    "ONE_TIME_ADDRESS",
    "END_USER_WALLET",
];

const PEER_TYPES: &[&str] = &[
    "VAULT_ACCOUNT",
    "EXCHANGE_ACCOUNT",
    "INTERNAL_WALLET",
    "EXTERNAL_WALLET",
    "CONTRACT",
    "NETWORK_CONNECTION",
    "FIAT_ACCOUNT",
    "COMPOUND",
    "GAS_STATION",
    "ONE_TIME_ADDRESS",
    "UNKNOWN",
    "END_USER_WALLET",
    "PROGRAM_CALL",
    "MULTI_DESTINATION",
];

const OPERATIONS: &[&str] = &[
    "TRANSFER",
    "BURN",
    "CONTRACT_CALL",
    "PROGRAM_CALL",
    "MINT",
    "RAW",
    "TYPED_MESSAGE",
    "APPROVE",
    "ENABLE_ASSET",
];

pub(super) fn tools(api: &Arc<dyn CustodyApi>) -> Vec<Tool> {
    vec![get_transactions(api.clone()), create_transaction(api.clone())]
}

/// Query filters for `GET /v1/transactions`
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetTransactionsArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<String>,
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dest_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dest_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assets: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_wallet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dest_wallet_id: Option<String>,
}

fn get_transactions(api: Arc<dyn CustodyApi>) -> Tool {
    let schema = ObjectSchema::strict()
        .field(
            "before",
            Field::string().optional().describe(
                "Unix timestamp in milliseconds. Returns only transactions created before the specified date",
            ),
        )
        .field(
            "after",
            Field::string().optional().describe(
                "Unix timestamp in milliseconds. Returns only transactions created after the specified date",
            ),
        )
        .field("status", Field::string().optional().describe("Filter by transaction status"))
        .field(
            "orderBy",
            Field::one_of(&["createdAt", "lastUpdated"])
                .optional()
                .describe("The field to order the results by"),
        )
        .field(
            "sort",
            Field::one_of(&["ASC", "DESC"])
                .optional()
                .describe("The direction to order the results by"),
        )
        .field(
            "limit",
            Field::integer().range(1, 100).default(50).describe(
                "Limits the number of results. If not provided, a limit of 50 will be used. The maximum allowed limit is 100",
            ),
        )
        .field(
            "sourceType",
            Field::one_of(SOURCE_TYPES)
                .optional()
                .describe("The source type of the transaction"),
        )
        .field("sourceId", Field::string().optional().describe("The source ID of the transaction"))
        .field(
            "destType",
            Field::one_of(DEST_TYPES)
                .optional()
                .describe("The destination type of the transaction"),
        )
        .field("destId", Field::string().optional().describe("The destination ID of the transaction"))
        .field(
            "assets",
            Field::string()
                .optional()
                .describe("A list of assets to filter by, separated by commas"),
        )
        .field(
            "txHash",
            Field::string()
                .optional()
                .describe("Returns only results with a specified txHash"),
        )
        .field(
            "sourceWalletId",
            Field::string()
                .optional()
                .describe("Returns only results where the source is a specific end user wallet"),
        )
        .field(
            "destWalletId",
            Field::string()
                .optional()
                .describe("Returns only results where the destination is a specific end user wallet"),
        );

    Tool::new(
        "get_transactions",
        "Get Fireblocks transactions with optional filtering",
        schema,
        move |args: GetTransactionsArgs| {
            let api = api.clone();
            async move {
                let transactions = api.get_transactions(serde_json::to_value(&args)?).await?;

                Ok::<_, ToolError>(json!({
                    "success": true,
                    "count": count(&transactions),
                    "transactions": transactions,
                }))
            }
        },
    )
}

/// One-time destination address
#[derive(Debug, Deserialize, Serialize)]
struct OneTimeAddress {
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
}

/// Source or destination of a transfer
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferPeerPath {
    #[serde(rename = "type")]
    peer_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wallet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    one_time_address: Option<OneTimeAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_collateral: Option<bool>,
}

/// Body of `POST /v1/transactions`
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTransactionArgs {
    operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_tx_id: Option<String>,
    asset_id: String,
    source: TransferPeerPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination: Option<TransferPeerPath>,
    amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    treat_as_gross_amount: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    force_sweep: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fee_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority_fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_on_low_fee: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_total_fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network_fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replace_tx_by_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_ref_id: Option<String>,
}

fn peer_path() -> ObjectSchema {
    let one_time_address = ObjectSchema::new()
        .field("address", Field::string().describe("The destination address"))
        .field("tag", Field::string().optional().describe("Optional tag for the address"));

    ObjectSchema::new()
        .field("type", Field::one_of(PEER_TYPES).describe("The type of peer path"))
        .field("id", Field::string().optional().describe("The ID of the peer"))
        .field("name", Field::string().optional().describe("The name of the peer"))
        .field("walletId", Field::string().optional().describe("The wallet ID"))
        .field(
            "oneTimeAddress",
            Field::object(one_time_address)
                .optional()
                .describe("One-time address details"),
        )
        .field("subType", Field::string().optional().describe("Sub-type of the peer"))
        .field(
            "isCollateral",
            Field::boolean()
                .optional()
                .describe("Whether this is a collateral account"),
        )
}

fn create_transaction(api: Arc<dyn CustodyApi>) -> Tool {
    let schema = ObjectSchema::strict()
        .field(
            "operation",
            Field::one_of(OPERATIONS)
                .default("TRANSFER")
                .describe("The type of operation to perform"),
        )
        .field("note", Field::string().optional().describe("Custom note to describe the transaction"))
        .field(
            "externalTxId",
            Field::string()
                .optional()
                .describe("External transaction ID to avoid duplicate transactions"),
        )
        .field(
            "assetId",
            Field::string().describe("The ID of the asset to transfer (e.g., BTC, ETH)"),
        )
        .field("source", Field::object(peer_path()).describe("The source of the transaction"))
        .field(
            "destination",
            Field::object(peer_path())
                .optional()
                .describe("The destination of the transaction"),
        )
        .field(
            "amount",
            Field::string().describe("The amount to transfer as a string for precision"),
        )
        .field(
            "treatAsGrossAmount",
            Field::boolean()
                .optional()
                .describe("Whether to deduct fee from the requested amount"),
        )
        .field(
            "forceSweep",
            Field::boolean()
                .optional()
                .describe("For Polkadot/Kusama/Westend only - empty the asset wallet"),
        )
        .field(
            "feeLevel",
            Field::one_of(&["LOW", "MEDIUM", "HIGH"])
                .optional()
                .describe("Blockchain fee level"),
        )
        .field("fee", Field::string().optional().describe("Custom fee amount"))
        .field(
            "priorityFee",
            Field::string()
                .optional()
                .describe("Priority fee for EIP-1559 transactions (Ethereum)"),
        )
        .field("failOnLowFee", Field::boolean().optional().describe("Fail if fee is too low"))
        .field("maxFee", Field::string().optional().describe("Maximum fee to pay"))
        .field(
            "maxTotalFee",
            Field::string()
                .optional()
                .describe("Maximum total fee (BTC-based blockchains only)"),
        )
        .field("gasLimit", Field::string().optional().describe("Gas limit for EVM transactions"))
        .field(
            "gasPrice",
            Field::string()
                .optional()
                .describe("Gas price for non-EIP-1559 EVM transactions"),
        )
        .field(
            "networkFee",
            Field::string()
                .optional()
                .describe("Total network fee for EVM transactions"),
        )
        .field(
            "replaceTxByHash",
            Field::string()
                .optional()
                .describe("Hash of stuck transaction to replace"),
        )
        .field(
            "customerRefId",
            Field::string()
                .optional()
                .describe("Customer reference ID for AML providers"),
        );

    Tool::new(
        "create_transaction",
        "Create a new Fireblocks transaction",
        schema,
        move |args: CreateTransactionArgs| {
            let api = api.clone();
            async move {
                let transaction = api.create_transaction(serde_json::to_value(&args)?).await?;
                Ok::<_, ToolError>(transaction)
            }
        },
    )
    .mutating()
}
