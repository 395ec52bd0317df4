//! MCP tool parameter schemas
//!
//! Defines the input parameter structures for all MCP tools.
//! All structs derive `Debug`, `Deserialize`, and `JsonSchema` as required
//! by rmcp.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Parameters for the `customer_data` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CustomerDataParams {
    /// The operation to perform.
    #[schemars(description = "Operation to perform: get, update, or delete")]
    pub operation: String,

    /// Dotted field path.
    #[schemars(
        description = "Dotted field path, e.g. 'name', 'shipping_address.city', or 'preferences.theme' (unknown roots are scoped under custom_fields)"
    )]
    pub field: Option<String>,

    /// Value to write (update with field only).
    #[schemars(description = "Value to write; requires field and operation=update")]
    pub value: Option<Value>,

    /// Shipping address object to merge (update only).
    #[schemars(
        description = "Shipping address object to merge into the profile (operation=update)"
    )]
    pub shipping_address: Option<Map<String, Value>>,

    /// Billing address object to merge (update only).
    #[schemars(
        description = "Billing address object to merge into the profile (operation=update)"
    )]
    pub billing_address: Option<Map<String, Value>>,

    /// Custom fields object to merge recursively (update only).
    #[schemars(
        description = "Arbitrary nested fields to merge recursively into custom_fields (operation=update)"
    )]
    pub custom_fields: Option<Map<String, Value>>,
}

/// Parameters for the `storefront_discover` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DiscoverParams {
    /// Candidate URL.
    #[schemars(description = "URL to classify; scheme defaults to https://")]
    pub url: String,
}

/// Parameters for the `storefront_graphql` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GraphqlParams {
    /// Request mode.
    #[schemars(description = "Mode: execute, test, or introspect")]
    pub mode: String,

    /// Storefront host, e.g. `demo.myshopify.com`.
    #[schemars(
        description = "Storefront host (defaults to SHOPIFY_STORE_NAME from the environment)"
    )]
    pub host: Option<String>,

    /// Storefront access token.
    #[schemars(
        description = "Storefront access token (defaults to SHOPIFY_STOREFRONT_ACCESS_TOKEN)"
    )]
    pub token: Option<String>,

    /// GraphQL query (execute and test modes).
    #[schemars(description = "GraphQL query, forwarded verbatim (execute and test modes)")]
    pub query: Option<String>,

    /// GraphQL variables, forwarded verbatim.
    #[schemars(description = "GraphQL variables object, forwarded verbatim")]
    pub variables: Option<Value>,

    /// Storefront API version.
    #[schemars(description = "Storefront API version (defaults to SHOPIFY_API_VERSION or 2025-04)")]
    pub api_version: Option<String>,
}
