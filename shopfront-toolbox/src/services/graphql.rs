//! Shopify Storefront GraphQL relay client.
//!
//! Queries and variables are opaque payloads forwarded verbatim; responses
//! are relayed without schema interpretation. The probe sets below only
//! classify what a token can reach — they never parse result shapes beyond
//! the presence of `data`/`errors`.

use log::debug;
use serde_json::{json, Value};

use super::HTTP_CLIENT;
use crate::error::{ToolboxError, ToolboxResult};
use crate::types::{ComponentAccess, TokenValidation, WorkflowGuidance};

/// Storefront API version used when the caller does not pick one.
pub const DEFAULT_API_VERSION: &str = "2025-04";

/// Live no-op used to check that a token is accepted at all.
const SCHEMA_PROBE: &str = "{__schema{queryType{name}}}";

/// Permission probes, named after the storefront access scopes they map to.
const PERMISSION_PROBES: &[(&str, &str)] = &[
    (
        "unauthenticated_read_product_listings",
        "{products(first:1){edges{node{id}}}}",
    ),
    ("cart_create", "mutation{cartCreate(input:{}){cart{id}}}"),
    ("unauthenticated_read_content", "{shop{name description}}"),
    (
        "unauthenticated_read_customer",
        "mutation{customerAccessTokenCreate(input:{email:\"test@example.com\",password:\"test\"}){customerUserErrors{message}}}",
    ),
    (
        "unauthenticated_read_collection_listings",
        "{collections(first:1){edges{node{id}}}}",
    ),
    ("product_types_access", "{productTypes(first:1){edges{node}}}"),
    (
        "search_access",
        "{search(query:\"test\",types:PRODUCT,first:1){edges{node{__typename}}}}",
    ),
    (
        "metafields_access",
        "{shop{metafields(first:1){edges{node{id}}}}}",
    ),
];

/// API components probed by `introspect_components`.
const COMPONENT_PROBES: &[(&str, &str)] = &[
    ("shop", "{shop{name}}"),
    ("products", "{products(first:1){edges{node{id}}}}"),
    ("collections", "{collections(first:1){edges{node{id}}}}"),
    ("productTypes", "{productTypes(first:1){edges{node}}}"),
    (
        "search",
        "{search(query:\"test\",types:PRODUCT,first:1){edges{node{__typename}}}}",
    ),
    ("cart_create", "mutation{cartCreate(input:{}){cart{id}}}"),
];

/// Client for one storefront's GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    host: String,
    api_version: String,
    token: String,
}

impl GraphqlClient {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token: token.into(),
        }
    }

    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// The versioned GraphQL endpoint for this client's host.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "https://{}/api/{}/graphql.json",
            self.host, self.api_version
        )
    }

    /// Forward one query verbatim and relay the raw response body.
    pub async fn execute(&self, query: &str, variables: Option<&Value>) -> ToolboxResult<Value> {
        let mut payload = json!({ "query": query });
        if let Some(variables) = variables {
            payload["variables"] = variables.clone();
        }

        let endpoint = self.endpoint();
        debug!("[graphql] POST {endpoint}");
        let response = HTTP_CLIENT
            .post(&endpoint)
            .header("X-Shopify-Storefront-Access-Token", &self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolboxError::TimeoutError(format!("POST {endpoint} timed out: {e}"))
                } else {
                    ToolboxError::NetworkError(format!("POST {endpoint} failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolboxError::NetworkError(format!(
                "{endpoint} returned HTTP {}",
                status.as_u16()
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            ToolboxError::NetworkError(format!("{endpoint} response is not JSON: {e}"))
        })
    }

    /// Validate this client's token with a live no-op, then map out which
    /// permission probes it passes.
    ///
    /// Fails soft: a rejected token yields `valid: false`, not an error.
    /// Timeouts still propagate so a slow host stays distinguishable from a
    /// bad token.
    pub async fn validate_token(&self) -> ToolboxResult<TokenValidation> {
        let mut validation = TokenValidation {
            valid: false,
            permissions: Vec::new(),
            denied: Vec::new(),
        };

        let schema = match self.execute(SCHEMA_PROBE, None).await {
            Ok(body) => body,
            Err(ToolboxError::TimeoutError(message)) => {
                return Err(ToolboxError::TimeoutError(message));
            }
            Err(e) => {
                debug!("[graphql] schema probe rejected: {e}");
                return Ok(validation);
            }
        };
        if schema
            .get("data")
            .and_then(|data| data.get("__schema"))
            .is_none()
        {
            return Ok(validation);
        }
        validation.valid = true;

        for (name, query) in PERMISSION_PROBES {
            match self.execute(query, None).await {
                Ok(body) if body.get("errors").is_none() => {
                    validation.permissions.push((*name).to_string());
                }
                _ => validation.denied.push((*name).to_string()),
            }
        }
        Ok(validation)
    }

    /// Probe which API components this token can reach and derive workflow
    /// guidance from the result.
    pub async fn introspect_components(&self) -> ToolboxResult<ComponentAccess> {
        let mut accessible = Vec::new();
        let mut inaccessible = Vec::new();
        for (name, query) in COMPONENT_PROBES {
            match self.execute(query, None).await {
                Ok(body) if body.get("errors").is_none() => {
                    accessible.push((*name).to_string());
                }
                _ => inaccessible.push((*name).to_string()),
            }
        }
        let workflow_guidance = workflow_guidance(&accessible);
        Ok(ComponentAccess {
            accessible,
            inaccessible,
            workflow_guidance,
        })
    }
}

/// Derive a recommended workflow from the accessible components.
pub(crate) fn workflow_guidance(accessible: &[String]) -> WorkflowGuidance {
    let has = |name: &str| accessible.iter().any(|component| component == name);

    if has("products") {
        WorkflowGuidance {
            summary: "This token has good product access capabilities.".to_string(),
            recommended_workflow: vec![
                "1. Query products directly".to_string(),
                "2. Get variant IDs from product queries".to_string(),
                "3. Create cart with selected variants".to_string(),
            ],
            warnings: Vec::new(),
        }
    } else if has("productTypes") && has("search") {
        WorkflowGuidance {
            summary: "This token has limited access but can discover products via search."
                .to_string(),
            recommended_workflow: vec![
                "1. Query product types to discover categories".to_string(),
                "2. Use search with product types to find products".to_string(),
                "3. Extract variant IDs from search results".to_string(),
            ],
            warnings: Vec::new(),
        }
    } else if has("cart_create") {
        WorkflowGuidance {
            summary: "This token can only create carts but cannot access products directly."
                .to_string(),
            recommended_workflow: Vec::new(),
            warnings: vec![
                "Product discovery is severely limited. You may need variant IDs from another source."
                    .to_string(),
            ],
        }
    } else {
        WorkflowGuidance {
            summary: "This token exposes no usable storefront components.".to_string(),
            recommended_workflow: Vec::new(),
            warnings: vec![
                "No product discovery or cart path is accessible with this token.".to_string(),
            ],
        }
    }
}

/// Suggest alternatives for common query errors (GraphQL `test` mode).
#[must_use]
pub fn analyze_errors(query: &str, errors: &Value) -> Vec<String> {
    let mut suggestions = Vec::new();
    if let Some(errors) = errors.as_array() {
        for error in errors {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if message.contains("Access denied") && query.contains("products") {
                suggestions.push(
                    "Token lacks permission to access products directly. Try using search instead."
                        .to_string(),
                );
            }
        }
    }
    suggestions
}
