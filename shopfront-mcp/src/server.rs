//! MCP server implementation for Shopfront.
//!
//! Exposes three tools (customer profile CRUD, storefront discovery, and
//! the GraphQL relay) plus `customer://` read resources. All toolbox calls
//! go through a gateway trait so tests can mock network behavior, and every
//! external call runs under a per-tool timeout.

use async_trait::async_trait;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        AnnotateAble, CallToolResult, Content, Implementation, ListResourcesResult,
        PaginatedRequestParams, ProtocolVersion, RawResource, ReadResourceRequestParams,
        ReadResourceResult, Resource, ResourceContents, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{Duration, timeout};

use shopfront_core::{CoreError, ProfileOutcome, ProfileRequest, ProfileService};
use shopfront_toolbox::{
    ComponentAccess, DiscoveryReport, GraphqlClient, TokenRecovery, TokenValidation, ToolboxError,
    ToolboxResult, ToolboxService,
};

use crate::config::RuntimeCredentials;
use crate::schemas::{CustomerDataParams, DiscoverParams, GraphqlParams};

// Timeout constants for external service calls
const PROFILE_TIMEOUT_SECS: u64 = 10;
const DISCOVERY_TIMEOUT_SECS: u64 = 45;
const TOKEN_RECOVERY_TIMEOUT_SECS: u64 = 60;
const GRAPHQL_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Copy)]
struct ToolTimeouts {
    profile: Duration,
    discovery: Duration,
    token_recovery: Duration,
    graphql: Duration,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            profile: Duration::from_secs(PROFILE_TIMEOUT_SECS),
            discovery: Duration::from_secs(DISCOVERY_TIMEOUT_SECS),
            token_recovery: Duration::from_secs(TOKEN_RECOVERY_TIMEOUT_SECS),
            graphql: Duration::from_secs(GRAPHQL_TIMEOUT_SECS),
        }
    }
}

/// Network-facing toolbox calls behind a seam so tests can mock them.
#[async_trait]
trait StorefrontGateway: Send + Sync {
    async fn discover(&self, url: &str) -> ToolboxResult<DiscoveryReport>;

    async fn recover_token(&self, url: &str) -> ToolboxResult<TokenRecovery>;

    async fn execute(
        &self,
        host: &str,
        api_version: &str,
        token: &str,
        query: &str,
        variables: Option<&Value>,
    ) -> ToolboxResult<Value>;

    async fn validate_token(
        &self,
        host: &str,
        api_version: &str,
        token: &str,
    ) -> ToolboxResult<TokenValidation>;

    async fn introspect(
        &self,
        host: &str,
        api_version: &str,
        token: &str,
    ) -> ToolboxResult<ComponentAccess>;
}

#[derive(Default)]
struct DefaultStorefrontGateway;

#[async_trait]
impl StorefrontGateway for DefaultStorefrontGateway {
    async fn discover(&self, url: &str) -> ToolboxResult<DiscoveryReport> {
        ToolboxService::discover(url).await
    }

    async fn recover_token(&self, url: &str) -> ToolboxResult<TokenRecovery> {
        ToolboxService::recover_token(url).await
    }

    async fn execute(
        &self,
        host: &str,
        api_version: &str,
        token: &str,
        query: &str,
        variables: Option<&Value>,
    ) -> ToolboxResult<Value> {
        GraphqlClient::new(host, token)
            .with_api_version(api_version)
            .execute(query, variables)
            .await
    }

    async fn validate_token(
        &self,
        host: &str,
        api_version: &str,
        token: &str,
    ) -> ToolboxResult<TokenValidation> {
        GraphqlClient::new(host, token)
            .with_api_version(api_version)
            .validate_token()
            .await
    }

    async fn introspect(
        &self,
        host: &str,
        api_version: &str,
        token: &str,
    ) -> ToolboxResult<ComponentAccess> {
        GraphqlClient::new(host, token)
            .with_api_version(api_version)
            .introspect_components()
            .await
    }
}

/// Sanitize error messages to prevent sensitive information leakage.
///
/// Logs the full error to stderr but returns a generic message to the client.
fn sanitize_internal_error(error: impl std::fmt::Display, context: &str) -> McpError {
    log::error!("{context} error: {error}");
    McpError::internal_error(
        format!("{context} failed - check server logs for details"),
        None,
    )
}

/// Map profile-layer errors: caller mistakes become invalid-params, lock
/// contention stays visible as retryable, storage details are sanitized.
fn map_core_error(context: &str, error: &CoreError) -> McpError {
    if error.is_expected() {
        log::warn!("{context} error: {error}");
    } else {
        log::error!("{context} error: {error}");
    }
    match error {
        CoreError::ValidationError(message) => McpError::invalid_params(message.clone(), None),
        CoreError::LockTimeout(message) => McpError::internal_error(
            format!("profile store is busy, retry: {message}"),
            None,
        ),
        CoreError::StorageCorruption(message) => McpError::internal_error(message.clone(), None),
        _ => McpError::internal_error(
            format!("{context} failed - check server logs for details"),
            None,
        ),
    }
}

fn map_toolbox_error(context: &str, error: &ToolboxError) -> McpError {
    log::warn!("{context} error: {error}");
    match error {
        ToolboxError::ValidationError(message) => McpError::invalid_params(message.clone(), None),
        _ => McpError::internal_error(error.to_string(), None),
    }
}

/// Serialize a result payload into one text content block.
fn json_result<T: serde::Serialize>(value: &T, context: &str) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| sanitize_internal_error(e, context))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Combined output of the `storefront_discover` tool.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct DiscoverOutput {
    #[serde(flatten)]
    report: DiscoveryReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_source: Option<String>,
    /// Set when validation against the live endpoint was possible; absent
    /// when no token or no canonical host was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    token_valid: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    permissions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    recovery_notes: Vec<String>,
}

/// Output of `storefront_graphql` in `test` mode.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlTestOutput {
    success: bool,
    data: Value,
    errors: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    suggestions: Vec<String>,
}

/// MCP Server for Shopfront.
///
/// Provides AI agents with customer profile access and storefront
/// discovery through the Model Context Protocol.
#[derive(Clone)]
pub struct ShopfrontMcp {
    /// Profile access protocol over the durable store.
    profile: Arc<ProfileService>,
    /// Environment-derived default credentials.
    credentials: RuntimeCredentials,
    /// Gateway for network-facing toolbox calls.
    gateway: Arc<dyn StorefrontGateway>,
    /// Timeout configuration for external calls.
    timeouts: ToolTimeouts,
    /// Tool router generated by macro.
    tool_router: ToolRouter<Self>,
}

impl ShopfrontMcp {
    /// Create a new MCP server instance.
    #[must_use]
    pub fn new(profile: Arc<ProfileService>, credentials: RuntimeCredentials) -> Self {
        Self::with_gateway_and_timeouts(
            profile,
            credentials,
            Arc::new(DefaultStorefrontGateway),
            ToolTimeouts::default(),
        )
    }

    fn with_gateway_and_timeouts(
        profile: Arc<ProfileService>,
        credentials: RuntimeCredentials,
        gateway: Arc<dyn StorefrontGateway>,
        timeouts: ToolTimeouts,
    ) -> Self {
        Self {
            profile,
            credentials,
            gateway,
            timeouts,
            tool_router: Self::tool_router(),
        }
    }

    /// Resolve host/token/api-version from call arguments plus environment
    /// defaults; both host and token are required for GraphQL calls.
    fn resolve_credentials(
        &self,
        host: Option<String>,
        token: Option<String>,
        api_version: Option<String>,
    ) -> Result<(String, String, String), McpError> {
        let host = host.or_else(|| self.credentials.host());
        let token = token.or_else(|| self.credentials.token.clone());
        let api_version = api_version.unwrap_or_else(|| self.credentials.api_version.clone());
        match (host, token) {
            (Some(host), Some(token)) => Ok((host, token, api_version)),
            _ => Err(McpError::invalid_params(
                "missing host and/or token: pass them as arguments or set \
                 SHOPIFY_STORE_NAME / SHOPIFY_STOREFRONT_ACCESS_TOKEN",
                None,
            )),
        }
    }

    /// Shared `get` used by the `customer://` resources.
    async fn profile_get(&self, field: Option<&str>) -> Result<ProfileOutcome, McpError> {
        self.profile
            .get(field)
            .await
            .map_err(|e| map_core_error("Customer data", &e))
    }
}

#[tool_router]
impl ShopfrontMcp {
    /// CRUD over the local customer profile.
    #[tool(
        description = "Read, update, or delete fields of the local customer profile (name, email, phone, shipping_address, billing_address, and arbitrary nested custom fields)"
    )]
    async fn customer_data(
        &self,
        Parameters(params): Parameters<CustomerDataParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = ProfileRequest {
            operation: params.operation,
            field: params.field,
            value: params.value,
            shipping_address: params.shipping_address,
            billing_address: params.billing_address,
            custom_fields: params.custom_fields,
        };

        let outcome = timeout(self.timeouts.profile, self.profile.handle(request))
            .await
            .map_err(|_| McpError::internal_error("customer_data timeout", None))?
            .map_err(|e| map_core_error("Customer data", &e))?;

        json_result(&outcome, "Serialize customer data result")
    }

    /// Classify a URL and opportunistically recover a token from it.
    #[tool(
        description = "Classify a URL as a Shopify storefront and attempt to recover a usable storefront access token from its public surfaces"
    )]
    async fn storefront_discover(
        &self,
        Parameters(params): Parameters<DiscoverParams>,
    ) -> Result<CallToolResult, McpError> {
        let report = timeout(self.timeouts.discovery, self.gateway.discover(&params.url))
            .await
            .map_err(|_| McpError::internal_error("storefront_discover timeout", None))?
            .map_err(|e| map_toolbox_error("Storefront discovery", &e))?;

        let mut output = DiscoverOutput {
            report,
            token: None,
            token_source: None,
            token_valid: None,
            permissions: Vec::new(),
            recovery_notes: Vec::new(),
        };

        if output.report.is_storefront {
            match timeout(
                self.timeouts.token_recovery,
                self.gateway.recover_token(&params.url),
            )
            .await
            {
                Err(_) => output
                    .recovery_notes
                    .push("token recovery timed out".to_string()),
                Ok(Err(e)) => output
                    .recovery_notes
                    .push(format!("token recovery failed: {e}")),
                Ok(Ok(recovery)) => {
                    output.recovery_notes = recovery.notes;
                    if let Some(candidate) = recovery.candidate {
                        // Validation is delegated to the GraphQL collaborator;
                        // it needs the canonical host to build an endpoint.
                        if let Some(host) = output.report.canonical_host.clone() {
                            match timeout(
                                self.timeouts.graphql,
                                self.gateway.validate_token(
                                    &host,
                                    &self.credentials.api_version,
                                    &candidate.token,
                                ),
                            )
                            .await
                            {
                                Ok(Ok(validation)) => {
                                    output.token_valid = Some(validation.valid);
                                    output.permissions = validation.permissions;
                                }
                                Ok(Err(e)) => output
                                    .recovery_notes
                                    .push(format!("token validation failed: {e}")),
                                Err(_) => output
                                    .recovery_notes
                                    .push("token validation timed out".to_string()),
                            }
                        }
                        output.token_source = Some(candidate.surface.to_string());
                        output.token = Some(candidate.token);
                    }
                }
            }
        }

        json_result(&output, "Serialize discovery result")
    }

    /// Relay GraphQL payloads to a storefront endpoint.
    #[tool(
        description = "Execute a Shopify Storefront GraphQL request (modes: execute, test, introspect); host and token default to the environment configuration"
    )]
    async fn storefront_graphql(
        &self,
        Parameters(params): Parameters<GraphqlParams>,
    ) -> Result<CallToolResult, McpError> {
        let (host, token, api_version) =
            self.resolve_credentials(params.host, params.token, params.api_version)?;

        match params.mode.to_lowercase().as_str() {
            "execute" => {
                let query = params.query.ok_or_else(|| {
                    McpError::invalid_params("query is required for execute mode", None)
                })?;
                let data = timeout(
                    self.timeouts.graphql,
                    self.gateway
                        .execute(&host, &api_version, &token, &query, params.variables.as_ref()),
                )
                .await
                .map_err(|_| McpError::internal_error("storefront_graphql timeout", None))?
                .map_err(|e| map_toolbox_error("GraphQL execute", &e))?;

                json_result(&data, "Serialize GraphQL response")
            }
            "test" => {
                let query = params.query.ok_or_else(|| {
                    McpError::invalid_params("query is required for test mode", None)
                })?;
                let result = timeout(
                    self.timeouts.graphql,
                    self.gateway
                        .execute(&host, &api_version, &token, &query, params.variables.as_ref()),
                )
                .await;

                let output = match result {
                    Ok(Ok(body)) => {
                        let errors = body.get("errors").cloned().unwrap_or(Value::Null);
                        let data = body.get("data").cloned().unwrap_or(Value::Null);
                        let suggestions = if errors.is_null() {
                            Vec::new()
                        } else {
                            shopfront_toolbox::analyze_errors(&query, &errors)
                        };
                        GraphqlTestOutput {
                            success: errors.is_null(),
                            data,
                            errors,
                            suggestions,
                        }
                    }
                    Ok(Err(e)) => GraphqlTestOutput {
                        success: false,
                        data: Value::Null,
                        errors: serde_json::json!([{ "message": e.to_string() }]),
                        suggestions: vec!["Network or server error occurred".to_string()],
                    },
                    Err(_) => GraphqlTestOutput {
                        success: false,
                        data: Value::Null,
                        errors: serde_json::json!([{ "message": "request timed out" }]),
                        suggestions: vec!["Network or server error occurred".to_string()],
                    },
                };

                json_result(&output, "Serialize GraphQL test result")
            }
            "introspect" => {
                let access = timeout(
                    self.timeouts.graphql,
                    self.gateway.introspect(&host, &api_version, &token),
                )
                .await
                .map_err(|_| McpError::internal_error("storefront_graphql timeout", None))?
                .map_err(|e| map_toolbox_error("GraphQL introspect", &e))?;

                json_result(&access, "Serialize introspection result")
            }
            other => Err(McpError::invalid_params(
                format!("invalid mode: {other} (expected execute, test, or introspect)"),
                None,
            )),
        }
    }
}

/// Stable read-surface identifiers, each mapping to a profile `get`.
const CUSTOMER_RESOURCES: &[(&str, &str, &str, &str)] = &[
    (
        "customer://name",
        "Customer Name",
        "The customer's full name",
        "text/plain",
    ),
    (
        "customer://email",
        "Customer Email",
        "The customer's email address",
        "text/plain",
    ),
    (
        "customer://phone",
        "Customer Phone",
        "The customer's phone number",
        "text/plain",
    ),
    (
        "customer://shipping_address",
        "Shipping Address",
        "The customer's shipping address",
        "application/json",
    ),
    (
        "customer://billing_address",
        "Billing Address",
        "The customer's billing address",
        "application/json",
    ),
    (
        "customer://profile",
        "Customer Profile",
        "The customer's complete profile information",
        "application/json",
    ),
];

fn customer_resources() -> Vec<Resource> {
    CUSTOMER_RESOURCES
        .iter()
        .map(|(uri, name, description, mime_type)| {
            let mut resource = RawResource::new(*uri, (*name).to_string());
            resource.description = Some((*description).to_string());
            resource.mime_type = Some((*mime_type).to_string());
            resource.no_annotation()
        })
        .collect()
}

#[tool_handler]
impl ServerHandler for ShopfrontMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Shopfront MCP Server - Manage a local customer profile and discover Shopify \
                 storefronts. Use customer_data for profile CRUD (fields, addresses, nested \
                 custom fields), storefront_discover to classify a URL and recover a storefront \
                 access token, and storefront_graphql to run Storefront API queries against a \
                 known host. The customer:// resources expose read-only profile fields."
                    .into(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: customer_resources(),
            ..ListResourcesResult::default()
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let uri = request.uri;
        let Some((_, _, _, mime_type)) = CUSTOMER_RESOURCES
            .iter()
            .find(|(resource_uri, ..)| *resource_uri == uri)
        else {
            return Err(McpError::resource_not_found(
                format!("unknown resource: {uri}"),
                None,
            ));
        };

        let field = uri.strip_prefix("customer://").unwrap_or_default();
        let outcome = if field == "profile" {
            self.profile_get(None).await?
        } else {
            self.profile_get(Some(field)).await?
        };

        let text = match outcome {
            ProfileOutcome::Record { record } => serde_json::to_string_pretty(&record)
                .map_err(|e| sanitize_internal_error(e, "Serialize resource"))?,
            // An unset field is routine: empty text, or an empty object for
            // JSON-typed resources.
            ProfileOutcome::Field {
                value: Value::Null, ..
            } => {
                if *mime_type == "application/json" {
                    "{}".to_string()
                } else {
                    String::new()
                }
            }
            ProfileOutcome::Field {
                value: Value::String(text),
                ..
            } => text,
            ProfileOutcome::Field { value, .. } => serde_json::to_string_pretty(&value)
                .map_err(|e| sanitize_internal_error(e, "Serialize resource"))?,
            other => {
                return Err(McpError::internal_error(
                    format!("unexpected outcome reading {uri}: {other:?}"),
                    None,
                ));
            }
        };

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri)],
        })
    }
}

#[cfg(test)]
#[path = "test_mocks.rs"]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
pub(crate) mod test_mocks;

#[cfg(test)]
#[path = "server_tests.rs"]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests;
