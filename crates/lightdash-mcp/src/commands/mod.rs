//! Command implementations.

use anyhow::Context;
use lightdash_mcp_core::{Config, LightdashClient};

pub mod check;
pub mod info;
#[cfg(feature = "mcp")]
pub mod serve;

/// Build an API client from the loaded configuration.
///
/// Fails before any network call when the API key is missing.
pub fn build_client(config: &Config) -> anyhow::Result<LightdashClient> {
    let api_key = config.require_api_key()?;
    LightdashClient::new(&config.api_url, api_key.expose(), config.request_timeout())
        .with_context(|| format!("failed to set up client for {}", config.api_url))
}
