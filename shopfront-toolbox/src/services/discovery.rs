//! Storefront classification heuristics.
//!
//! Each evidence source is an independent unit of work with its own timeout;
//! a failing source becomes `inconclusive` evidence instead of aborting the
//! others. The final call is made by [`decide`], a pure function over the
//! collected evidence, so new signals can be added without touching the
//! decision logic.

use std::sync::LazyLock;
use std::time::Instant;

use log::debug;
use regex::Regex;
use serde_json::Value;
use url::Url;

use super::http_get;
use crate::error::ToolboxResult;
use crate::types::{Confidence, DiscoveryReport, Evidence, EvidenceSource, Verdict};

/// Header name prefixes that identify Shopify edge responses.
const SHOPIFY_HEADER_PREFIXES: &[&str] = &["x-shopify", "x-shop", "x-shardid", "x-sorting-hat"];

/// HTML markers that identify a Shopify-rendered page.
static HTML_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)cdn\.shopify(?:cdn)?\.net|cdn\.shopify\.com",
        r#"(?i)class=["'][^"']*shopify-section"#,
        r"(?i)window\.Shopify|Shopify\.theme",
        r"(?i)[a-zA-Z0-9-]+\.myshopify\.com",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Patterns that map a page to its canonical `*.myshopify.com` host, most
/// specific first. `Shopify.shop` may carry a bare shop name.
static CANONICAL_HOST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)["'](?:https?://)?([a-zA-Z0-9][a-zA-Z0-9-]*\.myshopify\.com)["'/]"#,
        r#"(?i)["']myshopify_domain["']\s*:\s*["']([^"']+)["']"#,
        r#"Shopify\.shop\s*=\s*["']([^"']+)["']"#,
        r"(?i)\b([a-zA-Z0-9][a-zA-Z0-9-]*\.myshopify\.com)\b",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Landing-page response, captured once and inspected by several sources.
struct LandingPage {
    header_names: Vec<String>,
    body: String,
}

pub(crate) async fn classify_storefront(url: &Url) -> ToolboxResult<DiscoveryReport> {
    debug!("[discovery] classifying {url}");
    let start = Instant::now();

    // The landing page and the endpoint probes are independent, separately
    // timed units; none of them holds any lock.
    let (page, products, cart) = futures::join!(
        fetch_landing_page(url),
        probe_products_json(url),
        probe_cart_js(url),
    );

    let mut evidence = vec![products, cart];
    let mut canonical_host = host_if_myshopify(url);

    match page {
        Ok(page) => {
            evidence.push(headers_evidence(&page));
            evidence.push(markers_evidence(&page));
            if canonical_host.is_none() {
                canonical_host = extract_canonical_host(&page.body);
            }
        }
        Err(e) => {
            let detail = e.to_string();
            evidence.push(Evidence::inconclusive(
                EvidenceSource::ResponseHeaders,
                detail.clone(),
            ));
            evidence.push(Evidence::inconclusive(EvidenceSource::PageMarkers, detail));
        }
    }
    evidence.push(domain_evidence(canonical_host.as_deref()));

    let (is_storefront, confidence) = decide(&evidence);

    // u128 -> u64: elapsed millis for a bounded probe never exceed u64::MAX
    #[allow(clippy::cast_possible_truncation)]
    let response_time_ms = start.elapsed().as_millis() as u64;

    debug!(
        "[discovery] {url}: storefront={is_storefront} confidence={confidence:?} ({}ms)",
        response_time_ms
    );

    Ok(DiscoveryReport {
        url: url.to_string(),
        is_storefront,
        confidence,
        canonical_host,
        evidence,
        response_time_ms,
    })
}

/// Combine evidence with explicit precedence:
/// 1. any strong `supports` is decisive positive;
/// 2. weak `supports` from two or more sources is a moderate positive;
/// 3. a lone weak `supports` among refuting/unanswered sources stays
///    inconclusive rather than guessed;
/// 4. no `supports` at all is a negative — high confidence when at least
///    one source actually answered, inconclusive when none did.
pub(crate) fn decide(evidence: &[Evidence]) -> (bool, Confidence) {
    if evidence
        .iter()
        .any(|e| e.verdict == Verdict::Supports && e.source.is_strong())
    {
        return (true, Confidence::High);
    }

    let supports = evidence
        .iter()
        .filter(|e| e.verdict == Verdict::Supports)
        .count();
    let answered = evidence
        .iter()
        .any(|e| e.verdict != Verdict::Inconclusive);

    match supports {
        0 if answered => (false, Confidence::High),
        0 => (false, Confidence::Inconclusive),
        1 => (false, Confidence::Inconclusive),
        _ => (true, Confidence::Moderate),
    }
}

async fn fetch_landing_page(url: &Url) -> ToolboxResult<LandingPage> {
    let response = http_get(url.as_str()).await?;
    let header_names = response
        .headers()
        .keys()
        .map(|name| name.as_str().to_lowercase())
        .collect();
    let body = response.text().await.map_err(|e| {
        crate::error::ToolboxError::NetworkError(format!("failed to read {url}: {e}"))
    })?;
    Ok(LandingPage { header_names, body })
}

/// Rebase `url` onto a well-known storefront endpoint path.
fn endpoint_url(url: &Url, path: &str) -> Url {
    let mut endpoint = url.clone();
    endpoint.set_path(path);
    endpoint.set_query(None);
    endpoint.set_fragment(None);
    endpoint
}

async fn probe_products_json(url: &Url) -> Evidence {
    let source = EvidenceSource::StorefrontEndpoint;
    let endpoint = endpoint_url(url, "/products.json");
    match http_get(endpoint.as_str()).await {
        Ok(response) if response.status().is_success() => {
            match response.json::<Value>().await {
                Ok(body) if body.get("products").is_some_and(Value::is_array) => {
                    Evidence::supports(source, format!("{endpoint} returned a products listing"))
                }
                Ok(_) => Evidence::refutes(
                    source,
                    format!("{endpoint} returned JSON without a products listing"),
                ),
                Err(_) => Evidence::refutes(source, format!("{endpoint} did not return JSON")),
            }
        }
        Ok(response) => Evidence::refutes(
            source,
            format!("{endpoint} returned HTTP {}", response.status().as_u16()),
        ),
        Err(e) => Evidence::inconclusive(source, e.to_string()),
    }
}

async fn probe_cart_js(url: &Url) -> Evidence {
    let source = EvidenceSource::CartEndpoint;
    let endpoint = endpoint_url(url, "/cart.js");
    match http_get(endpoint.as_str()).await {
        Ok(response) if response.status().is_success() => {
            match response.json::<Value>().await {
                Ok(body) if body.get("token").is_some() || body.get("items").is_some() => {
                    Evidence::supports(source, format!("{endpoint} returned a cart payload"))
                }
                Ok(_) => Evidence::refutes(
                    source,
                    format!("{endpoint} returned JSON without a cart shape"),
                ),
                Err(_) => Evidence::refutes(source, format!("{endpoint} did not return JSON")),
            }
        }
        Ok(response) => Evidence::refutes(
            source,
            format!("{endpoint} returned HTTP {}", response.status().as_u16()),
        ),
        Err(e) => Evidence::inconclusive(source, e.to_string()),
    }
}

fn headers_evidence(page: &LandingPage) -> Evidence {
    let source = EvidenceSource::ResponseHeaders;
    let hit = page.header_names.iter().find(|name| {
        SHOPIFY_HEADER_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
    });
    match hit {
        Some(name) => Evidence::supports(source, format!("response carries header {name}")),
        None => Evidence::refutes(source, "no Shopify-prefixed response headers"),
    }
}

fn markers_evidence(page: &LandingPage) -> Evidence {
    let source = EvidenceSource::PageMarkers;
    let hit = HTML_MARKERS
        .iter()
        .find(|marker| marker.is_match(&page.body));
    match hit {
        Some(marker) => Evidence::supports(source, format!("page matches {}", marker.as_str())),
        None => Evidence::refutes(source, "no Shopify markers in page HTML"),
    }
}

fn domain_evidence(canonical_host: Option<&str>) -> Evidence {
    let source = EvidenceSource::CanonicalDomain;
    match canonical_host {
        Some(host) => Evidence::supports(source, format!("canonical host {host}")),
        None => Evidence::refutes(source, "no myshopify.com domain found"),
    }
}

fn host_if_myshopify(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|host| host.to_lowercase().ends_with(".myshopify.com"))
        .map(str::to_lowercase)
}

/// Extract the canonical `*.myshopify.com` host from page HTML.
pub(crate) fn extract_canonical_host(body: &str) -> Option<String> {
    for pattern in CANONICAL_HOST_PATTERNS.iter() {
        let Some(captures) = pattern.captures(body) else {
            continue;
        };
        let Some(matched) = captures.get(1) else {
            continue;
        };
        let host = matched.as_str().to_lowercase();
        if host.contains(".myshopify.com") {
            return Some(host);
        }
        // Bare shop name from `Shopify.shop = "name"`.
        return Some(format!("{host}.myshopify.com"));
    }
    None
}
