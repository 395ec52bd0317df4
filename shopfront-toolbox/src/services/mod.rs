//! Stateless service façade exposing the toolbox operations.
//!
//! Every method on [`ToolboxService`] is an async associated function — no
//! instance needed. All network calls share one HTTP client and carry their
//! own timeout.

mod discovery;
mod graphql;
mod token_recovery;

use std::sync::LazyLock;

use reqwest::Client;
use tokio::time::{timeout, Duration};
use url::Url;

pub use graphql::{analyze_errors, GraphqlClient, DEFAULT_API_VERSION};

use crate::error::{ToolboxError, ToolboxResult};
use crate::types::{DiscoveryReport, TokenRecovery};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("shopfront-mcp/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with configured timeout and redirect policy.
pub(crate) static HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
});

/// One GET with the shared client, mapping timeouts apart from other
/// network failures.
pub(crate) async fn http_get(url: &str) -> ToolboxResult<reqwest::Response> {
    let outer = Duration::from_secs(REQUEST_TIMEOUT_SECS + 2);
    match timeout(outer, HTTP_CLIENT.get(url).send()).await {
        Err(_) => Err(ToolboxError::TimeoutError(format!(
            "GET {url} timed out ({REQUEST_TIMEOUT_SECS}s)"
        ))),
        Ok(Err(e)) if e.is_timeout() => Err(ToolboxError::TimeoutError(format!(
            "GET {url} timed out: {e}"
        ))),
        Ok(Err(e)) => Err(ToolboxError::NetworkError(format!("GET {url} failed: {e}"))),
        Ok(Ok(response)) => Ok(response),
    }
}

/// Validate and normalise a candidate URL.
///
/// Trims whitespace, defaults the scheme to `https://`, and requires a
/// parseable URL with a host. Rejected input never reaches the network.
fn normalize_url(raw: &str) -> ToolboxResult<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ToolboxError::ValidationError(
            "URL is required".to_string(),
        ));
    }
    let candidate = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let parsed = Url::parse(&candidate)
        .map_err(|e| ToolboxError::ValidationError(format!("Invalid URL '{raw}': {e}")))?;
    if parsed.host_str().is_none() {
        return Err(ToolboxError::ValidationError(format!(
            "URL has no host: {raw}"
        )));
    }
    Ok(parsed)
}

/// Entry point for the storefront discovery operations.
///
/// All methods are stateless associated functions — call them directly on
/// the type.
///
/// ```rust,no_run
/// use shopfront_toolbox::ToolboxService;
/// # async fn demo() -> shopfront_toolbox::ToolboxResult<()> {
/// let report = ToolboxService::discover("examplestore.com").await?;
/// # Ok(())
/// # }
/// ```
pub struct ToolboxService;

impl ToolboxService {
    /// Classify a URL as Shopify-storefront-backed or not.
    ///
    /// Consults each evidence source independently and combines the verdicts
    /// with an explicit precedence; see [`DiscoveryReport`].
    pub async fn discover(url: &str) -> ToolboxResult<DiscoveryReport> {
        let url = normalize_url(url)?;
        discovery::classify_storefront(&url).await
    }

    /// Attempt to recover a storefront access token from a URL's public
    /// surfaces. Best effort: an explicit not-found result is routine.
    pub async fn recover_token(url: &str) -> ToolboxResult<TokenRecovery> {
        let url = normalize_url(url)?;
        token_recovery::recover_token(&url).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::normalize_url;
    use crate::error::ToolboxError;

    #[test]
    fn normalize_url_defaults_to_https() {
        let url = normalize_url("examplestore.com").unwrap();
        assert_eq!(url.as_str(), "https://examplestore.com/");
    }

    #[test]
    fn normalize_url_keeps_explicit_scheme() {
        let url = normalize_url("http://examplestore.com/shop").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.path(), "/shop");
    }

    #[test]
    fn normalize_url_trims_whitespace() {
        let url = normalize_url("  examplestore.com  ").unwrap();
        assert_eq!(url.host_str(), Some("examplestore.com"));
    }

    #[test]
    fn normalize_url_rejects_empty() {
        assert!(matches!(
            normalize_url("   "),
            Err(ToolboxError::ValidationError(_))
        ));
    }

    #[test]
    fn normalize_url_rejects_garbage() {
        assert!(matches!(
            normalize_url("http://"),
            Err(ToolboxError::ValidationError(_))
        ));
    }
}
