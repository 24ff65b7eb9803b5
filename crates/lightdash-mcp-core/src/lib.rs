//! Core library for lightdash-mcp.
//!
//! This crate provides the pieces the `lightdash-mcp` server is built from,
//! independent of any MCP transport.
//!
//! # Modules
//!
//! - [`config`] - Configuration loading and management
//! - [`error`] - Error types and result aliases
//! - [`client`] - Lightdash REST API client
//! - [`retry`] - Exponential-backoff retry policy
//! - [`enrich`] - Actionable messages from API error payloads
//! - [`normalize`] - Qualifying short field names in queries
//! - [`query`] - Validating and building explore queries
//! - [`rows`] - Flattening result rows
//! - [`cache`] - TTL cache for expensive lookups
//! - [`analysis`] - Heuristic query complexity and timing statistics
//!
//! # Quick Start
//!
//! ```no_run
//! use lightdash_mcp_core::{ConfigLoader, LightdashClient, with_retry};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (config, _sources) = ConfigLoader::new().load()?;
//! let client = LightdashClient::new(
//!     &config.api_url,
//!     config.require_api_key()?.expose(),
//!     config.request_timeout(),
//! )?;
//! let projects = with_retry(&config.retry_config(), || client.list_projects()).await?;
//! println!("{} projects", projects.len());
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]

pub mod analysis;
pub mod cache;
pub mod client;
pub mod config;
pub mod enrich;
pub mod error;
pub mod normalize;
pub mod query;
pub mod retry;
pub mod rows;

pub use cache::TtlCache;
pub use client::{LightdashClient, ProjectSummary, QueryResults};
pub use config::{ApiKey, Config, ConfigLoader, ConfigSources, HttpConfig, LogLevel, Transport};
pub use enrich::{ApiError, enrich_error};
pub use error::{ClientError, ClientResult, ConfigError, ConfigResult, QueryError, QueryResult};
pub use query::{MetricQuery, QueryRequest};
pub use retry::{RetryConfig, is_retryable, with_retry};
