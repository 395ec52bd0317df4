//! MCP server entry point for Shopfront.
//!
//! Starts the MCP server with stdio transport. The customer profile lives
//! in one JSON document under the platform data directory (overridable with
//! `SHOPFRONT_DATA_DIR`); storefront credentials may be provided through
//! the environment or per tool call.

mod config;
mod schemas;
mod server;

use std::process::ExitCode;
use std::sync::Arc;

use rmcp::ServiceExt;
use server::ShopfrontMcp;
use shopfront_core::{ProfileService, ProfileStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing to stderr (MCP uses stdout for protocol)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_ansi(false),
        )
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    tracing::info!("Starting Shopfront MCP Server");

    let profile_path = config::profile_document_path();
    tracing::info!("Customer profile document: {}", profile_path.display());

    let credentials = config::RuntimeCredentials::from_env();
    if credentials.host().is_none() || credentials.token.is_none() {
        tracing::info!(
            "No storefront credentials in the environment; GraphQL tools will rely on per-call host/token"
        );
    }

    let profile_service = Arc::new(ProfileService::new(ProfileStore::new(profile_path)));
    let mcp_server = ShopfrontMcp::new(profile_service, credentials);

    tracing::info!("MCP server initialized with 3 tools and 6 customer resources");

    tracing::info!("Starting MCP server on stdio transport");
    let service = match mcp_server.serve(rmcp::transport::stdio()).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to start MCP server: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = service.waiting().await {
        tracing::error!("MCP server error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
