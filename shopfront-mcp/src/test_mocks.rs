use super::*;

use tokio::sync::Mutex;

use shopfront_core::ProfileStore;
use shopfront_toolbox::{
    Confidence, Evidence, EvidenceSource, TokenCandidate, TokenSurface, WorkflowGuidance,
};

/// Test gateway with recorded calls and injectable results.
#[derive(Default)]
pub struct MockStorefrontGateway {
    discover_calls: Mutex<Vec<String>>,
    discover_report: Mutex<Option<DiscoveryReport>>,
    discover_error: Mutex<Option<String>>,
    discover_delay: Mutex<Option<Duration>>,
    recover_calls: Mutex<Vec<String>>,
    recovery: Mutex<Option<TokenRecovery>>,
    validate_calls: Mutex<Vec<(String, String)>>,
    validation: Mutex<Option<TokenValidation>>,
    execute_calls: Mutex<Vec<(String, String, String, String)>>,
    execute_result: Mutex<Option<Value>>,
    execute_error: Mutex<Option<String>>,
    introspect_calls: Mutex<Vec<String>>,
}

impl MockStorefrontGateway {
    pub async fn set_discover_report(&self, report: DiscoveryReport) {
        *self.discover_report.lock().await = Some(report);
    }

    pub async fn set_discover_error(&self, error: &str) {
        *self.discover_error.lock().await = Some(error.to_string());
    }

    pub async fn set_discover_delay(&self, delay: Duration) {
        *self.discover_delay.lock().await = Some(delay);
    }

    pub async fn set_recovery(&self, recovery: TokenRecovery) {
        *self.recovery.lock().await = Some(recovery);
    }

    pub async fn set_validation(&self, validation: TokenValidation) {
        *self.validation.lock().await = Some(validation);
    }

    pub async fn set_execute_result(&self, result: Value) {
        *self.execute_result.lock().await = Some(result);
    }

    pub async fn set_execute_error(&self, error: &str) {
        *self.execute_error.lock().await = Some(error.to_string());
    }

    pub async fn discover_calls(&self) -> Vec<String> {
        self.discover_calls.lock().await.clone()
    }

    pub async fn recover_calls(&self) -> Vec<String> {
        self.recover_calls.lock().await.clone()
    }

    pub async fn validate_calls(&self) -> Vec<(String, String)> {
        self.validate_calls.lock().await.clone()
    }

    pub async fn execute_calls(&self) -> Vec<(String, String, String, String)> {
        self.execute_calls.lock().await.clone()
    }

    pub async fn introspect_calls(&self) -> Vec<String> {
        self.introspect_calls.lock().await.clone()
    }
}

#[async_trait]
impl StorefrontGateway for MockStorefrontGateway {
    async fn discover(&self, url: &str) -> ToolboxResult<DiscoveryReport> {
        self.discover_calls.lock().await.push(url.to_string());

        if let Some(delay) = *self.discover_delay.lock().await {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.discover_error.lock().await.clone() {
            return Err(ToolboxError::NetworkError(message));
        }

        Ok(self
            .discover_report
            .lock()
            .await
            .clone()
            .unwrap_or_else(|| non_storefront_report(url)))
    }

    async fn recover_token(&self, url: &str) -> ToolboxResult<TokenRecovery> {
        self.recover_calls.lock().await.push(url.to_string());
        Ok(self.recovery.lock().await.clone().unwrap_or(TokenRecovery {
            candidate: None,
            scanned_assets: 0,
            notes: Vec::new(),
        }))
    }

    async fn execute(
        &self,
        host: &str,
        api_version: &str,
        token: &str,
        query: &str,
        _variables: Option<&Value>,
    ) -> ToolboxResult<Value> {
        self.execute_calls.lock().await.push((
            host.to_string(),
            api_version.to_string(),
            token.to_string(),
            query.to_string(),
        ));
        if let Some(message) = self.execute_error.lock().await.clone() {
            return Err(ToolboxError::NetworkError(message));
        }
        Ok(self
            .execute_result
            .lock()
            .await
            .clone()
            .unwrap_or_else(|| serde_json::json!({ "data": {} })))
    }

    async fn validate_token(
        &self,
        host: &str,
        _api_version: &str,
        token: &str,
    ) -> ToolboxResult<TokenValidation> {
        self.validate_calls
            .lock()
            .await
            .push((host.to_string(), token.to_string()));
        Ok(self.validation.lock().await.clone().unwrap_or(TokenValidation {
            valid: false,
            permissions: Vec::new(),
            denied: Vec::new(),
        }))
    }

    async fn introspect(
        &self,
        host: &str,
        _api_version: &str,
        _token: &str,
    ) -> ToolboxResult<ComponentAccess> {
        self.introspect_calls.lock().await.push(host.to_string());
        Ok(ComponentAccess {
            accessible: vec!["shop".to_string()],
            inaccessible: vec!["products".to_string()],
            workflow_guidance: WorkflowGuidance {
                summary: "mock guidance".to_string(),
                recommended_workflow: Vec::new(),
                warnings: Vec::new(),
            },
        })
    }
}

pub fn storefront_report(url: &str) -> DiscoveryReport {
    DiscoveryReport {
        url: url.to_string(),
        is_storefront: true,
        confidence: Confidence::High,
        canonical_host: Some("demo.myshopify.com".to_string()),
        evidence: vec![Evidence::supports(
            EvidenceSource::StorefrontEndpoint,
            "mock products listing",
        )],
        response_time_ms: 5,
    }
}

pub fn non_storefront_report(url: &str) -> DiscoveryReport {
    DiscoveryReport {
        url: url.to_string(),
        is_storefront: false,
        confidence: Confidence::High,
        canonical_host: None,
        evidence: vec![Evidence::refutes(
            EvidenceSource::StorefrontEndpoint,
            "mock 404",
        )],
        response_time_ms: 5,
    }
}

pub fn recovery_with(token: &str) -> TokenRecovery {
    TokenRecovery {
        candidate: Some(TokenCandidate {
            token: token.to_string(),
            surface: TokenSurface::ScriptConfig,
        }),
        scanned_assets: 2,
        notes: Vec::new(),
    }
}

pub fn env_credentials() -> RuntimeCredentials {
    RuntimeCredentials {
        store_name: Some("demo".to_string()),
        token: Some("env-token".to_string()),
        ..RuntimeCredentials::default()
    }
}

/// Build a server over a temp-dir-backed profile store and the given mocks.
pub(super) fn build_server(
    credentials: RuntimeCredentials,
    gateway: Arc<dyn StorefrontGateway>,
    timeouts: ToolTimeouts,
) -> (ShopfrontMcp, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let store = ProfileStore::new(tmp.path().join("customer.json"));
    let profile = Arc::new(ProfileService::new(store));
    let server = ShopfrontMcp::with_gateway_and_timeouts(profile, credentials, gateway, timeouts);
    (server, tmp)
}
