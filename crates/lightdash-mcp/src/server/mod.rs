//! MCP (Model Context Protocol) server implementation.
//!
//! This module exposes the Lightdash API over MCP, making projects, explores,
//! charts, dashboards and queries available to AI assistants over stdio or
//! streamable HTTP.
//!
//! # Architecture
//!
//! The server is a presentation layer over `lightdash-mcp-core`. Tool methods
//! resolve the project, call the client through the retry policy and render
//! the result as pretty JSON. Argument problems are reported as
//! invalid-params errors before any API call is made.
//!
//! - `tools` - the `#[tool_router]` impl and parameter structs
//! - `resources` - `lightdash://` resources, backed by the TTL cache
//! - `prompts` - canned prompts for common workflows
//! - `http` - streamable HTTP transport on axum
//!
//! # Adding Tools
//!
//! 1. Define a parameter struct with `Deserialize` + `JsonSchema`
//! 2. Add a `#[tool(description = "...")]` method to the `#[tool_router]` impl
//! 3. Call core library functions through [`LightdashServer::call`]
//! 4. Return [`json_result`] of whatever the API gave back

mod error;
pub mod http;
mod prompts;
mod resources;
mod tools;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lightdash_mcp_core::{ClientResult, Config, LightdashClient, RetryConfig, TtlCache, with_retry};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::model::*;
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, tool_handler};
use serde::Serialize;

use self::error::{OptionToMcpResult, ToMcpResult};

pub use self::tools::{
    BenchmarkQueryParams, ChartParams, DashboardParams, ExploreParams, ProjectParams,
    QueryParams, RunQueryParams, TableParams,
};

/// Settings the server takes from [`Config`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Retry policy applied to every API call.
    pub retry: RetryConfig,
    /// Project used when a tool call names none.
    pub default_project: Option<String>,
    /// Lifetime of cached resource reads.
    pub cache_ttl: Duration,
}

impl ServerOptions {
    /// Take the retry, project and cache settings from a loaded config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry: config.retry_config(),
            default_project: config.default_project().map(str::to_string),
            cache_ttl: config.cache_ttl(),
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// MCP server exposing the Lightdash API to AI assistants.
///
/// Cloning is cheap; clones share the HTTP connection pool and the cache,
/// which is what the streamable HTTP transport relies on when it builds one
/// handler per session.
#[derive(Clone)]
pub struct LightdashServer {
    client: LightdashClient,
    retry: RetryConfig,
    default_project: Option<String>,
    cache: Arc<TtlCache<String>>,
    tool_router: ToolRouter<Self>,
}

impl LightdashServer {
    /// The project to act on: the explicit argument, else the default.
    fn project(&self, explicit: Option<String>) -> Result<String, McpError> {
        explicit
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.default_project.clone())
            .mcp_ok_or_invalid(
                "project_uuid is required: pass it or set LIGHTDASH_PROJECT_UUID",
            )
    }

    /// Run an API call through the retry policy.
    async fn call<T, F, Fut>(&self, operation: F) -> Result<T, McpError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        with_retry(&self.retry, operation).await.mcp_internal()
    }
}

/// Render `value` as a pretty-printed JSON text result.
fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value).mcp_context("serialization error")?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[tool_handler]
impl ServerHandler for LightdashServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(format!(
                "{} MCP server for Lightdash. Start with list_projects, then \
                 list_explores and get_explore to discover fields. Use run_query \
                 with short field names (they are qualified with the explore id \
                 automatically). project_uuid may be omitted when a default \
                 project is configured{}.",
                env!("CARGO_PKG_NAME"),
                self.default_project
                    .as_deref()
                    .map(|p| format!(" (currently {p})"))
                    .unwrap_or_default(),
            )),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: self.resources().await?,
            next_cursor: None,
            ..Default::default()
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = self.read_resource_text(&request.uri).await?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult {
            prompts: prompts::list_prompts(),
            next_cursor: None,
            ..Default::default()
        })
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        let args = request.arguments.unwrap_or_default();
        prompts::get_prompt(&request.name, &args).mcp_invalid_params()
    }
}
