//! Storefront discovery toolbox for Shopfront MCP.
//!
//! Stateless helpers for classifying an arbitrary URL as a Shopify-backed
//! storefront, recovering a public access token from one, and relaying
//! opaque GraphQL payloads to a known endpoint. Independent of the profile
//! storage layer; every operation here may touch the network and carries
//! its own timeout.

mod error;
mod services;
mod types;

pub use error::{ToolboxError, ToolboxResult};
pub use services::{analyze_errors, GraphqlClient, ToolboxService, DEFAULT_API_VERSION};
pub use types::{
    ComponentAccess, Confidence, DiscoveryReport, Evidence, EvidenceSource, TokenCandidate,
    TokenRecovery, TokenSurface, TokenValidation, Verdict, WorkflowGuidance,
};
