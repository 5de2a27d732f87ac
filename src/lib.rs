//! Genesys Cloud Provider
//!
//! This crate implements an infrastructure-as-code provider for Genesys Cloud
//! routing configuration. An orchestration engine drives it through the
//! [`ProviderService`] trait; the provider maps desired-state documents onto
//! the platform's REST API and reconciles what the platform reports back.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **ProviderService trait**: The protocol the engine speaks, as async Rust
//! - **GenesysCloudProvider**: The implementation, configured from JSON and env vars
//! - **Platform client**: Region-aware REST client with OAuth, retries and proxy support
//! - **Retry and consistency checks**: Polling that tolerates eventual consistency
//! - **Resources**: `genesyscloud_routing_skill_group` resource and data source
//! - **Schema types**: Attribute schemas, validation and plan diffing
//! - **Logging**: Integration with `tracing`, including the SDK debug log
//!
//! # Quick Start
//!
//! ```ignore
//! use genesyscloud_provider::{init_logging, GenesysCloudProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = GenesysCloudProvider::new();
//!     provider
//!         .configure(json!({
//!             "oauthclient_id": "client-id",
//!             "oauthclient_secret": "client-secret",
//!             "aws_region": "us-east-1"
//!         }))
//!         .await?;
//!
//!     let state = provider
//!         .create(
//!             "genesyscloud_routing_skill_group",
//!             json!({
//!                 "name": "Tier 1 Support",
//!                 "skill_conditions": "[]",
//!                 "member_division_ids": ["*"]
//!             }),
//!         )
//!         .await?;
//!     tracing::info!(id = %state["id"], "created skill group");
//!     Ok(())
//! }
//! ```
//!
//! # Provider Protocol
//!
//! - **Schema / Metadata**: Provider config, resource and data source schemas
//! - **ValidateProviderConfig / Configure**: Resolve config and connect to the org
//! - **ValidateResourceConfig / Plan**: Check and diff desired state
//! - **Create/Read/Update/Delete**: Resource lifecycle with read-after-write checks
//! - **ImportResourceState / Export**: Adopt existing objects, enumerate them
//! - **ReadDataSource**: Look up existing objects by name

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod consistency;
pub mod error;
pub mod logging;
pub mod panic_recovery;
pub mod provider;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::GenesysClient;
pub use config::ProviderConfig;
pub use error::{ProviderError, Result};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{GenesysCloudProvider, ProviderMeta};
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
