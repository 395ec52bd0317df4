//! Core profile logic for Shopfront MCP.
//!
//! Owns the customer profile record: the path-addressable JSON record model,
//! the durable single-document store, and the get/update/delete access
//! protocol on top of it. Network concerns live in `shopfront-toolbox`.

pub mod error;
pub mod record;
pub mod service;
pub mod store;

pub use error::{CoreError, CoreResult};
pub use record::FieldPath;
pub use service::{ProfileOperation, ProfileOutcome, ProfileRequest, ProfileService};
pub use store::ProfileStore;
