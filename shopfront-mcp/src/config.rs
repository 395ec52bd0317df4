//! Environment-backed runtime configuration.
//!
//! Credential defaults come from the classic Storefront environment
//! variables; per-call tool arguments always win over the environment.

use std::path::PathBuf;

use shopfront_toolbox::DEFAULT_API_VERSION;

pub const ENV_DATA_DIR: &str = "SHOPFRONT_DATA_DIR";
pub const ENV_STORE_NAME: &str = "SHOPIFY_STORE_NAME";
pub const ENV_TOKEN: &str = "SHOPIFY_STOREFRONT_ACCESS_TOKEN";
pub const ENV_API_VERSION: &str = "SHOPIFY_API_VERSION";

const PROFILE_FILE_NAME: &str = "customer.json";

/// Directory the profile document lives in: `SHOPFRONT_DATA_DIR` when set,
/// otherwise the platform data directory.
fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("shopfront")
}

/// Full path of the profile document.
pub fn profile_document_path() -> PathBuf {
    data_dir().join(PROFILE_FILE_NAME)
}

/// Default storefront credentials taken from the environment at startup.
#[derive(Debug, Clone)]
pub struct RuntimeCredentials {
    /// Shop name; the default GraphQL host is `<name>.myshopify.com`.
    pub store_name: Option<String>,
    /// Storefront API access token.
    pub token: Option<String>,
    /// Storefront API version.
    pub api_version: String,
}

impl Default for RuntimeCredentials {
    fn default() -> Self {
        Self {
            store_name: None,
            token: None,
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

impl RuntimeCredentials {
    pub fn from_env() -> Self {
        Self {
            store_name: non_empty(std::env::var(ENV_STORE_NAME).ok()),
            token: non_empty(std::env::var(ENV_TOKEN).ok()),
            api_version: non_empty(std::env::var(ENV_API_VERSION).ok())
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        }
    }

    /// Default GraphQL host derived from the configured store name.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        self.store_name
            .as_ref()
            .map(|name| format!("{name}.myshopify.com"))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn host_is_derived_from_store_name() {
        let credentials = RuntimeCredentials {
            store_name: Some("demo".to_string()),
            ..RuntimeCredentials::default()
        };
        assert_eq!(credentials.host(), Some("demo.myshopify.com".to_string()));
    }

    #[test]
    fn missing_store_name_means_no_host() {
        assert_eq!(RuntimeCredentials::default().host(), None);
    }

    #[test]
    fn default_api_version_is_set() {
        assert_eq!(RuntimeCredentials::default().api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn non_empty_filters_blank_values() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" x ".to_string())), Some("x".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
