use super::test_mocks::*;
use super::*;

use serde_json::json;

fn result_json(result: &CallToolResult) -> Value {
    let text = result
        .content
        .first()
        .and_then(|c| c.raw.as_text())
        .map(|t| t.text.as_str())
        .expect("expected text content in result");
    serde_json::from_str(text).expect("tool output is JSON")
}

fn default_server() -> (ShopfrontMcp, Arc<MockStorefrontGateway>, tempfile::TempDir) {
    let gateway = Arc::new(MockStorefrontGateway::default());
    let (server, tmp) = build_server(
        env_credentials(),
        Arc::clone(&gateway) as Arc<dyn StorefrontGateway>,
        ToolTimeouts::default(),
    );
    (server, gateway, tmp)
}

// ==================== error mapping ====================

#[test]
fn sanitize_internal_error_hides_error_details() {
    let error = sanitize_internal_error("sensitive: token=123", "Customer data");
    let message = error.to_string();
    assert!(message.contains("Customer data failed"));
    assert!(!message.contains("token=123"));
}

#[test]
fn validation_errors_surface_to_the_caller() {
    let error = map_core_error(
        "Customer data",
        &CoreError::ValidationError("unknown operation: upsert".to_string()),
    );
    assert!(error.to_string().contains("unknown operation: upsert"));
}

#[test]
fn storage_errors_are_sanitized() {
    let error = map_core_error(
        "Customer data",
        &CoreError::StorageError("/secret/path denied".to_string()),
    );
    assert!(!error.to_string().contains("/secret/path"));
}

#[test]
fn lock_timeouts_read_as_retryable() {
    let error = map_core_error(
        "Customer data",
        &CoreError::LockTimeout("busy".to_string()),
    );
    assert!(error.to_string().contains("retry"));
}

// ==================== customer_data ====================

#[tokio::test]
async fn customer_data_get_on_fresh_store_is_empty_record() {
    let (server, _gateway, _tmp) = default_server();

    let result = server
        .customer_data(Parameters(CustomerDataParams {
            operation: "get".to_string(),
            field: None,
            value: None,
            shipping_address: None,
            billing_address: None,
            custom_fields: None,
        }))
        .await
        .unwrap();

    let body = result_json(&result);
    assert_eq!(body["outcome"], "record");
    assert_eq!(body["record"], json!({}));
}

#[tokio::test]
async fn customer_data_update_then_get_round_trips() {
    let (server, _gateway, _tmp) = default_server();

    server
        .customer_data(Parameters(CustomerDataParams {
            operation: "update".to_string(),
            field: Some("name".to_string()),
            value: Some(json!("Jane Doe")),
            shipping_address: None,
            billing_address: None,
            custom_fields: None,
        }))
        .await
        .unwrap();

    let result = server
        .customer_data(Parameters(CustomerDataParams {
            operation: "get".to_string(),
            field: Some("name".to_string()),
            value: None,
            shipping_address: None,
            billing_address: None,
            custom_fields: None,
        }))
        .await
        .unwrap();

    let body = result_json(&result);
    assert_eq!(body["outcome"], "field");
    assert_eq!(body["set"], true);
    assert_eq!(body["value"], "Jane Doe");
}

#[tokio::test]
async fn customer_data_unknown_operation_is_invalid_params() {
    let (server, _gateway, _tmp) = default_server();

    let error = server
        .customer_data(Parameters(CustomerDataParams {
            operation: "upsert".to_string(),
            field: None,
            value: None,
            shipping_address: None,
            billing_address: None,
            custom_fields: None,
        }))
        .await
        .unwrap_err();

    assert!(error.to_string().contains("unknown operation"));
}

#[tokio::test]
async fn customer_data_delete_of_absent_field_succeeds() {
    let (server, _gateway, _tmp) = default_server();

    let result = server
        .customer_data(Parameters(CustomerDataParams {
            operation: "delete".to_string(),
            field: Some("phone".to_string()),
            value: None,
            shipping_address: None,
            billing_address: None,
            custom_fields: None,
        }))
        .await
        .unwrap();

    let body = result_json(&result);
    assert_eq!(body["outcome"], "deleted");
    assert_eq!(body["removed"], false);
}

// ==================== storefront_discover ====================

#[tokio::test]
async fn discover_non_storefront_skips_token_recovery() {
    let (server, gateway, _tmp) = default_server();

    let result = server
        .storefront_discover(Parameters(DiscoverParams {
            url: "https://example.com".to_string(),
        }))
        .await
        .unwrap();

    let body = result_json(&result);
    assert_eq!(body["isStorefront"], false);
    assert!(body.get("token").is_none());
    assert!(gateway.recover_calls().await.is_empty());
}

#[tokio::test]
async fn discover_storefront_recovers_and_validates_token() {
    let (server, gateway, _tmp) = default_server();
    gateway
        .set_discover_report(storefront_report("https://shop.example.com/"))
        .await;
    gateway.set_recovery(recovery_with("cafebabe")).await;
    gateway
        .set_validation(TokenValidation {
            valid: true,
            permissions: vec!["unauthenticated_read_product_listings".to_string()],
            denied: Vec::new(),
        })
        .await;

    let result = server
        .storefront_discover(Parameters(DiscoverParams {
            url: "https://shop.example.com".to_string(),
        }))
        .await
        .unwrap();

    let body = result_json(&result);
    assert_eq!(body["isStorefront"], true);
    assert_eq!(body["token"], "cafebabe");
    assert_eq!(body["tokenSource"], "script_config");
    assert_eq!(body["tokenValid"], true);
    assert_eq!(
        body["permissions"],
        json!(["unauthenticated_read_product_listings"])
    );

    // Validation is delegated against the canonical host.
    let validate_calls = gateway.validate_calls().await;
    assert_eq!(
        validate_calls,
        vec![("demo.myshopify.com".to_string(), "cafebabe".to_string())]
    );
}

#[tokio::test]
async fn discover_without_candidate_reports_no_token() {
    let (server, gateway, _tmp) = default_server();
    gateway
        .set_discover_report(storefront_report("https://shop.example.com/"))
        .await;

    let result = server
        .storefront_discover(Parameters(DiscoverParams {
            url: "https://shop.example.com".to_string(),
        }))
        .await
        .unwrap();

    let body = result_json(&result);
    assert_eq!(body["isStorefront"], true);
    assert!(body.get("token").is_none());
    assert!(gateway.validate_calls().await.is_empty());
}

#[tokio::test]
async fn discover_network_error_is_surfaced() {
    let (server, gateway, _tmp) = default_server();
    gateway.set_discover_error("connect refused").await;

    let error = server
        .storefront_discover(Parameters(DiscoverParams {
            url: "https://unreachable.example".to_string(),
        }))
        .await
        .unwrap_err();

    assert!(error.to_string().contains("connect refused"));
}

#[tokio::test]
async fn discover_enforces_its_timeout() {
    let gateway = Arc::new(MockStorefrontGateway::default());
    gateway.set_discover_delay(Duration::from_millis(200)).await;

    let timeouts = ToolTimeouts {
        discovery: Duration::from_millis(50),
        ..ToolTimeouts::default()
    };
    let (server, _tmp) = build_server(
        env_credentials(),
        Arc::clone(&gateway) as Arc<dyn StorefrontGateway>,
        timeouts,
    );

    let error = server
        .storefront_discover(Parameters(DiscoverParams {
            url: "https://slow.example".to_string(),
        }))
        .await
        .unwrap_err();

    assert!(error.to_string().contains("timeout"));
}

// ==================== storefront_graphql ====================

fn graphql_params(mode: &str) -> GraphqlParams {
    GraphqlParams {
        mode: mode.to_string(),
        host: None,
        token: None,
        query: Some("{shop{name}}".to_string()),
        variables: None,
        api_version: None,
    }
}

#[tokio::test]
async fn graphql_execute_uses_environment_credentials() {
    let (server, gateway, _tmp) = default_server();

    let result = server
        .storefront_graphql(Parameters(graphql_params("execute")))
        .await;
    assert!(result.is_ok());

    let calls = gateway.execute_calls().await;
    assert_eq!(calls.len(), 1);
    let (host, api_version, token, query) = &calls[0];
    assert_eq!(host, "demo.myshopify.com");
    assert_eq!(api_version, shopfront_toolbox::DEFAULT_API_VERSION);
    assert_eq!(token, "env-token");
    assert_eq!(query, "{shop{name}}");
}

#[tokio::test]
async fn graphql_call_arguments_override_environment() {
    let (server, gateway, _tmp) = default_server();

    let params = GraphqlParams {
        host: Some("other.myshopify.com".to_string()),
        token: Some("call-token".to_string()),
        api_version: Some("2024-10".to_string()),
        ..graphql_params("execute")
    };
    server.storefront_graphql(Parameters(params)).await.unwrap();

    let calls = gateway.execute_calls().await;
    let (host, api_version, token, _query) = &calls[0];
    assert_eq!(host, "other.myshopify.com");
    assert_eq!(api_version, "2024-10");
    assert_eq!(token, "call-token");
}

#[tokio::test]
async fn graphql_without_any_credentials_is_invalid_params() {
    let gateway = Arc::new(MockStorefrontGateway::default());
    let (server, _tmp) = build_server(
        RuntimeCredentials::default(),
        gateway as Arc<dyn StorefrontGateway>,
        ToolTimeouts::default(),
    );

    let error = server
        .storefront_graphql(Parameters(graphql_params("execute")))
        .await
        .unwrap_err();

    assert!(error.to_string().contains("missing host and/or token"));
}

#[tokio::test]
async fn graphql_execute_requires_a_query() {
    let (server, _gateway, _tmp) = default_server();

    let params = GraphqlParams {
        query: None,
        ..graphql_params("execute")
    };
    let error = server
        .storefront_graphql(Parameters(params))
        .await
        .unwrap_err();

    assert!(error.to_string().contains("query is required"));
}

#[tokio::test]
async fn graphql_invalid_mode_is_rejected() {
    let (server, _gateway, _tmp) = default_server();

    let error = server
        .storefront_graphql(Parameters(graphql_params("mutate")))
        .await
        .unwrap_err();

    assert!(error.to_string().contains("invalid mode"));
}

#[tokio::test]
async fn graphql_test_mode_reports_success() {
    let (server, gateway, _tmp) = default_server();
    gateway
        .set_execute_result(json!({"data": {"shop": {"name": "Demo"}}}))
        .await;

    let result = server
        .storefront_graphql(Parameters(graphql_params("test")))
        .await
        .unwrap();

    let body = result_json(&result);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["shop"]["name"], "Demo");
}

#[tokio::test]
async fn graphql_test_mode_suggests_alternatives_on_denial() {
    let (server, gateway, _tmp) = default_server();
    gateway
        .set_execute_result(json!({
            "data": null,
            "errors": [{"message": "Access denied for field products"}]
        }))
        .await;

    let params = GraphqlParams {
        query: Some("{products(first:1){edges{node{id}}}}".to_string()),
        ..graphql_params("test")
    };
    let result = server.storefront_graphql(Parameters(params)).await.unwrap();

    let body = result_json(&result);
    assert_eq!(body["success"], false);
    let suggestions = body["suggestions"].as_array().unwrap();
    assert!(suggestions[0].as_str().unwrap().contains("search"));
}

#[tokio::test]
async fn graphql_test_mode_wraps_network_errors() {
    let (server, gateway, _tmp) = default_server();
    gateway.set_execute_error("connect refused").await;

    let result = server
        .storefront_graphql(Parameters(graphql_params("test")))
        .await
        .unwrap();

    let body = result_json(&result);
    assert_eq!(body["success"], false);
    assert!(body["errors"][0]["message"]
        .as_str()
        .unwrap()
        .contains("connect refused"));
}

#[tokio::test]
async fn graphql_introspect_probes_components() {
    let (server, gateway, _tmp) = default_server();

    let result = server
        .storefront_graphql(Parameters(graphql_params("introspect")))
        .await
        .unwrap();

    let body = result_json(&result);
    assert_eq!(body["accessible"], json!(["shop"]));
    assert_eq!(body["inaccessible"], json!(["products"]));
    assert_eq!(gateway.introspect_calls().await.len(), 1);
}

// ==================== resources ====================

#[test]
fn customer_resources_cover_the_read_surface() {
    let resources = customer_resources();
    assert_eq!(resources.len(), 6);

    let uris: Vec<&str> = resources.iter().map(|r| r.uri.as_str()).collect();
    for expected in [
        "customer://name",
        "customer://email",
        "customer://phone",
        "customer://shipping_address",
        "customer://billing_address",
        "customer://profile",
    ] {
        assert!(uris.contains(&expected), "missing resource {expected}");
    }
}
