//! Public types returned by toolbox operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One independent signal consulted while classifying a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    /// `/products.json` endpoint probe.
    StorefrontEndpoint,
    /// `/cart.js` endpoint probe.
    CartEndpoint,
    /// Shopify-prefixed response headers on the landing page.
    ResponseHeaders,
    /// Shopify markers in the landing page HTML.
    PageMarkers,
    /// `*.myshopify.com` canonical domain, literal or mapped.
    CanonicalDomain,
}

impl EvidenceSource {
    /// Whether a `supports` verdict from this source is decisive on its own.
    #[must_use]
    pub fn is_strong(self) -> bool {
        matches!(self, Self::StorefrontEndpoint | Self::CartEndpoint)
    }
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorefrontEndpoint => write!(f, "storefront_endpoint"),
            Self::CartEndpoint => write!(f, "cart_endpoint"),
            Self::ResponseHeaders => write!(f, "response_headers"),
            Self::PageMarkers => write!(f, "page_markers"),
            Self::CanonicalDomain => write!(f, "canonical_domain"),
        }
    }
}

/// What one evidence source concluded about a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Supports,
    Refutes,
    /// The source could not answer (network failure, timeout, malformed
    /// response). Never counted for or against.
    Inconclusive,
}

/// One collected piece of evidence, kept for diagnosability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub source: EvidenceSource,
    pub verdict: Verdict,
    /// Why the source reached its verdict: matched marker, HTTP status,
    /// network error, ...
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Evidence {
    #[must_use]
    pub fn supports(source: EvidenceSource, detail: impl Into<String>) -> Self {
        Self {
            source,
            verdict: Verdict::Supports,
            detail: Some(detail.into()),
        }
    }

    #[must_use]
    pub fn refutes(source: EvidenceSource, detail: impl Into<String>) -> Self {
        Self {
            source,
            verdict: Verdict::Refutes,
            detail: Some(detail.into()),
        }
    }

    #[must_use]
    pub fn inconclusive(source: EvidenceSource, detail: impl Into<String>) -> Self {
        Self {
            source,
            verdict: Verdict::Inconclusive,
            detail: Some(detail.into()),
        }
    }
}

/// Confidence attached to a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Moderate,
    /// Mixed weak signals; the engine refuses to guess.
    Inconclusive,
}

/// Result of classifying one URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    /// The normalized URL that was evaluated.
    pub url: String,
    pub is_storefront: bool,
    pub confidence: Confidence,
    /// Canonical `*.myshopify.com` host, when derivable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_host: Option<String>,
    pub evidence: Vec<Evidence>,
    pub response_time_ms: u64,
}

/// Public page surface a token candidate was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSurface {
    /// Inline script configuration object (`window.X = {...}`).
    ScriptConfig,
    /// `application/ld+json` block.
    JsonLd,
    /// Meta tag content.
    MetaTag,
    /// `data-*` attribute value.
    DataAttribute,
    /// Linked `cdn.shopify` / theme asset script.
    LinkedAsset,
}

impl fmt::Display for TokenSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScriptConfig => write!(f, "script_config"),
            Self::JsonLd => write!(f, "json_ld"),
            Self::MetaTag => write!(f, "meta_tag"),
            Self::DataAttribute => write!(f, "data_attribute"),
            Self::LinkedAsset => write!(f, "linked_asset"),
        }
    }
}

/// A recovered token candidate and the surface it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCandidate {
    pub token: String,
    pub surface: TokenSurface,
}

/// Outcome of a token recovery attempt.
///
/// `candidate: None` is an explicit not-found result; the engine never
/// fabricates or guesses a token string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecovery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<TokenCandidate>,
    /// Number of linked assets that were fetched and scanned.
    pub scanned_assets: usize,
    /// Per-surface failures that did not abort the scan.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notes: Vec<String>,
}

/// Result of validating a token against the live GraphQL endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenValidation {
    pub valid: bool,
    /// Permission probes that succeeded.
    pub permissions: Vec<String>,
    /// Permission probes that were denied.
    pub denied: Vec<String>,
}

/// Which API components a token can reach, with derived guidance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentAccess {
    pub accessible: Vec<String>,
    pub inaccessible: Vec<String>,
    pub workflow_guidance: WorkflowGuidance,
}

/// Recommended way to use a token given its component access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowGuidance {
    pub summary: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub recommended_workflow: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn evidence_source_strength() {
        assert!(EvidenceSource::StorefrontEndpoint.is_strong());
        assert!(EvidenceSource::CartEndpoint.is_strong());
        assert!(!EvidenceSource::ResponseHeaders.is_strong());
        assert!(!EvidenceSource::PageMarkers.is_strong());
        assert!(!EvidenceSource::CanonicalDomain.is_strong());
    }

    #[test]
    fn evidence_serializes_snake_case_tags() {
        let evidence = Evidence::supports(EvidenceSource::StorefrontEndpoint, "ok");
        let json = serde_json::to_value(&evidence).unwrap();
        assert_eq!(json["source"], "storefront_endpoint");
        assert_eq!(json["verdict"], "supports");
        assert_eq!(json["detail"], "ok");
    }

    #[test]
    fn report_omits_missing_canonical_host() {
        let report = DiscoveryReport {
            url: "https://example.com/".to_string(),
            is_storefront: false,
            confidence: Confidence::High,
            canonical_host: None,
            evidence: Vec::new(),
            response_time_ms: 3,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("canonicalHost").is_none());
        assert_eq!(json["isStorefront"], false);
    }
}
