//! Tool catalog.
//!
//! Every tool lives in the single `#[tool_router]` impl below, as the macro
//! requires. Tools that act on a project take an optional `project_uuid` and
//! fall back to the configured default.

use std::sync::Arc;

use lightdash_mcp_core::analysis::{complexity_score, predict_performance, summarize_samples};
use lightdash_mcp_core::rows::flatten_result_rows;
use lightdash_mcp_core::{LightdashClient, QueryRequest, QueryResults, TtlCache};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::schemars;
use rmcp::{ErrorData as McpError, tool, tool_router};
use serde_json::json;
use tokio::time::Instant;

use super::error::ToMcpResult;
use super::{LightdashServer, ServerOptions, json_result};

/// Iterations `benchmark_query` runs when none are requested.
const DEFAULT_BENCHMARK_ITERATIONS: u32 = 3;

/// Most iterations `benchmark_query` accepts.
const MAX_BENCHMARK_ITERATIONS: u32 = 10;

/// Parameters for tools that act on a whole project.
#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct ProjectParams {
    /// Project UUID. Defaults to the configured project.
    pub project_uuid: Option<String>,
}

/// Parameters for catalog lookups on one table.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct TableParams {
    /// Project UUID. Defaults to the configured project.
    pub project_uuid: Option<String>,
    /// Table (explore) name as it appears in the data catalog.
    pub table: String,
}

/// Parameters for `get_explore`.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ExploreParams {
    /// Project UUID. Defaults to the configured project.
    pub project_uuid: Option<String>,
    /// Explore (table) name, e.g. "orders".
    pub explore_id: String,
}

/// Parameters for `run_query`.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct RunQueryParams {
    /// Project UUID. Defaults to the configured project.
    pub project_uuid: Option<String>,
    /// The query. Field names may be given without the explore prefix.
    #[serde(flatten)]
    pub query: QueryRequest,
}

/// Parameters for `analyze_query`.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct QueryParams {
    /// The query to analyze.
    #[serde(flatten)]
    pub query: QueryRequest,
}

/// Parameters for `benchmark_query`.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct BenchmarkQueryParams {
    /// Project UUID. Defaults to the configured project.
    pub project_uuid: Option<String>,
    /// The query to time.
    #[serde(flatten)]
    pub query: QueryRequest,
    /// How many times to run the query (1-10, default 3).
    pub iterations: Option<u32>,
}

/// Parameters for saved chart tools.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ChartParams {
    /// Saved chart UUID.
    pub chart_uuid: String,
}

/// Parameters for `get_dashboard`.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct DashboardParams {
    /// Dashboard UUID.
    pub dashboard_uuid: String,
}

/// Reject blank identifiers before they end up as empty path segments.
fn required<'a>(value: &'a str, name: &str) -> Result<&'a str, McpError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(McpError::invalid_params(format!("{name} is required"), None));
    }
    Ok(trimmed)
}

/// Rows flattened to `{field: {raw, formatted}}` plus a count.
fn flattened(results: &QueryResults) -> serde_json::Value {
    let rows = flatten_result_rows(results.rows.as_deref());
    json!({
        "row_count": rows.len(),
        "rows": rows,
    })
}

#[tool_router]
impl LightdashServer {
    /// Create a new MCP server instance.
    pub fn new(client: LightdashClient, options: ServerOptions) -> Self {
        Self {
            client,
            retry: options.retry,
            default_project: options.default_project,
            cache: Arc::new(TtlCache::new(options.cache_ttl)),
            tool_router: Self::tool_router(),
        }
    }

    /// List every project visible to the API key.
    #[tool(description = "List all projects in the Lightdash organization")]
    #[tracing::instrument(skip(self), fields(otel.kind = "server"))]
    async fn list_projects(&self) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = "list_projects", "executing MCP tool");
        let projects = self.call(|| self.client.list_projects()).await?;
        tracing::info!(tool = "list_projects", count = projects.len(), "MCP tool completed");
        json_result(&projects)
    }

    /// Project details.
    #[tool(description = "Get details of a project (warehouse, dbt connection, settings)")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn get_project(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        tracing::debug!(tool = "get_project", %project, "executing MCP tool");
        let result = self.call(|| self.client.get_project(&project)).await?;
        tracing::info!(tool = "get_project", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "List the spaces (folders) in a project")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn list_spaces(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        tracing::debug!(tool = "list_spaces", %project, "executing MCP tool");
        let result = self.call(|| self.client.list_spaces(&project)).await?;
        tracing::info!(tool = "list_spaces", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "List the saved charts in a project")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn list_charts(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        tracing::debug!(tool = "list_charts", %project, "executing MCP tool");
        let result = self.call(|| self.client.list_charts(&project)).await?;
        tracing::info!(tool = "list_charts", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "List the dashboards in a project")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn list_dashboards(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        tracing::debug!(tool = "list_dashboards", %project, "executing MCP tool");
        let result = self.call(|| self.client.list_dashboards(&project)).await?;
        tracing::info!(tool = "list_dashboards", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "Get the custom metrics defined in a project")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn get_custom_metrics(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        tracing::debug!(tool = "get_custom_metrics", %project, "executing MCP tool");
        let result = self.call(|| self.client.get_custom_metrics(&project)).await?;
        tracing::info!(tool = "get_custom_metrics", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "Get the data catalog of a project (tables and fields)")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn get_catalog(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        tracing::debug!(tool = "get_catalog", %project, "executing MCP tool");
        let result = self.call(|| self.client.get_catalog(&project)).await?;
        tracing::info!(tool = "get_catalog", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "Get the metrics catalog of a project")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn get_metrics_catalog(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        tracing::debug!(tool = "get_metrics_catalog", %project, "executing MCP tool");
        let result = self
            .call(|| self.client.get_metrics_catalog(&project))
            .await?;
        tracing::info!(tool = "get_metrics_catalog", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "Export the saved charts of a project as code")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn get_charts_as_code(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        tracing::debug!(tool = "get_charts_as_code", %project, "executing MCP tool");
        let result = self.call(|| self.client.get_charts_as_code(&project)).await?;
        tracing::info!(tool = "get_charts_as_code", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "Export the dashboards of a project as code")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn get_dashboards_as_code(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        tracing::debug!(tool = "get_dashboards_as_code", %project, "executing MCP tool");
        let result = self
            .call(|| self.client.get_dashboards_as_code(&project))
            .await?;
        tracing::info!(tool = "get_dashboards_as_code", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "Get catalog metadata (description, fields, owner) for one table")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn get_metadata(
        &self,
        Parameters(params): Parameters<TableParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        let table = required(&params.table, "table")?;
        tracing::debug!(tool = "get_metadata", %project, table, "executing MCP tool");
        let result = self
            .call(|| self.client.get_metadata(&project, table))
            .await?;
        tracing::info!(tool = "get_metadata", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "Get usage analytics (charts and dashboards using it) for one table")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn get_analytics(
        &self,
        Parameters(params): Parameters<TableParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        let table = required(&params.table, "table")?;
        tracing::debug!(tool = "get_analytics", %project, table, "executing MCP tool");
        let result = self
            .call(|| self.client.get_analytics(&project, table))
            .await?;
        tracing::info!(tool = "get_analytics", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "List the organization's user attributes")]
    #[tracing::instrument(skip(self), fields(otel.kind = "server"))]
    async fn get_user_attributes(&self) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = "get_user_attributes", "executing MCP tool");
        let result = self.call(|| self.client.get_user_attributes()).await?;
        tracing::info!(tool = "get_user_attributes", "MCP tool completed");
        json_result(&result)
    }

    /// Explores are the queryable tables of a project.
    #[tool(description = "List the explores (queryable tables) in a project")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn list_explores(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        tracing::debug!(tool = "list_explores", %project, "executing MCP tool");
        let result = self.call(|| self.client.list_explores(&project)).await?;
        tracing::info!(tool = "list_explores", "MCP tool completed");
        json_result(&result)
    }

    #[tool(
        description = "Get the schema of one explore: its tables, dimensions and metrics with their field IDs"
    )]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn get_explore(
        &self,
        Parameters(params): Parameters<ExploreParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = self.project(params.project_uuid)?;
        let explore = required(&params.explore_id, "explore_id")?;
        tracing::debug!(tool = "get_explore", %project, explore, "executing MCP tool");
        let result = self
            .call(|| self.client.get_explore(&project, explore))
            .await?;
        tracing::info!(tool = "get_explore", "MCP tool completed");
        json_result(&result)
    }

    /// Run an explore query with normalized field references.
    #[tool(
        description = "Run a query against an explore. Dimension, metric, filter and sort fields may use short names (\"status\"); they are qualified with the explore id (\"orders_status\"). Returns flattened rows."
    )]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server", explore = %params.query.explore_id))]
    async fn run_query(
        &self,
        Parameters(params): Parameters<RunQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let metric_query = params.query.to_metric_query().mcp_invalid_params()?;
        let project = self.project(params.project_uuid)?;
        tracing::debug!(
            tool = "run_query",
            %project,
            dimensions = metric_query.dimensions.len(),
            metrics = metric_query.metrics.len(),
            limit = metric_query.limit,
            "executing MCP tool"
        );

        let results = self
            .call(|| self.client.run_query(&project, &metric_query))
            .await?;
        let output = flattened(&results);

        tracing::info!(tool = "run_query", rows = %output["row_count"], "MCP tool completed");
        json_result(&output)
    }

    #[tool(description = "Get the definition of a saved chart")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn get_saved_chart(
        &self,
        Parameters(params): Parameters<ChartParams>,
    ) -> Result<CallToolResult, McpError> {
        let chart = required(&params.chart_uuid, "chart_uuid")?;
        tracing::debug!(tool = "get_saved_chart", chart, "executing MCP tool");
        let result = self.call(|| self.client.get_saved_chart(chart)).await?;
        tracing::info!(tool = "get_saved_chart", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "Run a saved chart's query and return its flattened rows")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn run_saved_chart(
        &self,
        Parameters(params): Parameters<ChartParams>,
    ) -> Result<CallToolResult, McpError> {
        let chart = required(&params.chart_uuid, "chart_uuid")?;
        tracing::debug!(tool = "run_saved_chart", chart, "executing MCP tool");
        let results = self.call(|| self.client.run_saved_chart(chart)).await?;
        let output = flattened(&results);
        tracing::info!(tool = "run_saved_chart", rows = %output["row_count"], "MCP tool completed");
        json_result(&output)
    }

    #[tool(description = "Get a dashboard with its tiles and filters")]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn get_dashboard(
        &self,
        Parameters(params): Parameters<DashboardParams>,
    ) -> Result<CallToolResult, McpError> {
        let dashboard = required(&params.dashboard_uuid, "dashboard_uuid")?;
        tracing::debug!(tool = "get_dashboard", dashboard, "executing MCP tool");
        let result = self.call(|| self.client.get_dashboard(dashboard)).await?;
        tracing::info!(tool = "get_dashboard", "MCP tool completed");
        json_result(&result)
    }

    #[tool(description = "Get the user the API key belongs to")]
    #[tracing::instrument(skip(self), fields(otel.kind = "server"))]
    async fn get_current_user(&self) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = "get_current_user", "executing MCP tool");
        let result = self.call(|| self.client.get_current_user()).await?;
        tracing::info!(tool = "get_current_user", "MCP tool completed");
        json_result(&result)
    }

    /// Heuristic complexity without touching the API.
    #[tool(
        description = "Estimate the complexity and expected latency of a query without running it. Returns a score, contributing factors and recommendations."
    )]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn analyze_query(
        &self,
        Parameters(params): Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        params.query.validate().mcp_invalid_params()?;
        let shape = params.query.shape();
        let complexity = complexity_score(&shape);
        let performance = predict_performance(&complexity);

        tracing::info!(
            tool = "analyze_query",
            score = complexity.score,
            "MCP tool completed"
        );
        json_result(&json!({
            "explore_id": params.query.explore_id,
            "shape": shape,
            "complexity": complexity,
            "performance": performance,
        }))
    }

    /// Time repeated runs of a query.
    #[tool(
        description = "Run a query several times (1-10, default 3) and report timing statistics: mean, standard deviation, min, max and a 95% confidence interval in milliseconds"
    )]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server", explore = %params.query.explore_id))]
    async fn benchmark_query(
        &self,
        Parameters(params): Parameters<BenchmarkQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let iterations = params.iterations.unwrap_or(DEFAULT_BENCHMARK_ITERATIONS);
        if !(1..=MAX_BENCHMARK_ITERATIONS).contains(&iterations) {
            return Err(McpError::invalid_params(
                format!("iterations must be between 1 and {MAX_BENCHMARK_ITERATIONS}, got {iterations}"),
                None,
            ));
        }
        let metric_query = params.query.to_metric_query().mcp_invalid_params()?;
        let project = self.project(params.project_uuid)?;
        tracing::debug!(tool = "benchmark_query", %project, iterations, "executing MCP tool");

        let mut timings_ms = Vec::with_capacity(iterations as usize);
        let mut row_count = 0;
        for iteration in 1..=iterations {
            let started = Instant::now();
            let results = self
                .call(|| self.client.run_query(&project, &metric_query))
                .await?;
            let elapsed = started.elapsed().as_secs_f64() * 1000.0;
            tracing::debug!(iteration, elapsed_ms = elapsed, "benchmark iteration");
            timings_ms.push(elapsed);
            row_count = results.rows.as_ref().map_or(0, Vec::len);
        }

        let stats = summarize_samples(&timings_ms);
        tracing::info!(tool = "benchmark_query", iterations, "MCP tool completed");
        json_result(&json!({
            "explore_id": metric_query.explore_name,
            "iterations": iterations,
            "row_count": row_count,
            "timings_ms": timings_ms,
            "stats": stats,
        }))
    }
}
