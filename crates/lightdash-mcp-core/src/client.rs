//! HTTP client for the Lightdash REST API.
//!
//! Every endpoint answers `{"status": "ok", "results": ...}` on success and
//! `{"status": "error", "error": {...}}` on failure. The client unwraps the
//! envelope and turns failures into [`ClientError::Api`] with an enriched
//! message. Retrying is left to the caller (see [`crate::retry`]).

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::enrich::{ApiError, enrich_error};
use crate::error::{ClientError, ClientResult};
use crate::query::MetricQuery;
use crate::rows::ResultRow;

/// Lightdash Cloud.
pub const DEFAULT_API_URL: &str = "https://app.lightdash.cloud";

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest slice of a non-JSON error body kept in the message.
const MAX_ERROR_BODY_BYTES: usize = 512;

/// A project as listed by `GET /org/projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    /// Project id.
    pub project_uuid: String,
    /// Display name.
    pub name: String,
    /// `DEFAULT` or `PREVIEW`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    /// Remaining properties.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Results of an explore or saved-chart query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResults {
    /// Result rows in the nested cell format.
    #[serde(default)]
    pub rows: Option<Vec<ResultRow>>,
    /// Query as compiled by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_query: Option<Value>,
    /// Field metadata keyed by field id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,
    /// Remaining properties (cache metadata, chart info).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    results: Option<T>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

/// Thin typed wrapper over the Lightdash REST API.
#[derive(Debug, Clone)]
pub struct LightdashClient {
    http: Client,
    base_url: Url,
}

impl LightdashClient {
    /// Build a client for `api_url` authenticating with a personal access token.
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> ClientResult<Self> {
        let base_url = Url::parse(api_url)
            .map_err(|e| ClientError::Setup(format!("invalid api_url `{api_url}`: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Setup(format!(
                "api_url `{api_url}` cannot be used as a base URL"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("ApiKey {api_key}"))
            .map_err(|e| ClientError::Setup(format!("invalid api_key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .user_agent(concat!("lightdash-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Setup(e.without_url().to_string()))?;

        Ok(Self { http, base_url })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Setup("api_url cannot be used as a base URL".into()))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        segments: &[&str],
    ) -> ClientResult<T> {
        let url = self.url(segments)?;
        tracing::debug!(endpoint, path = url.path(), "GET");
        self.send(endpoint, self.http.get(url)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        segments: &[&str],
        body: &B,
    ) -> ClientResult<T> {
        let url = self.url(segments)?;
        tracing::debug!(endpoint, path = url.path(), "POST");
        self.send(endpoint, self.http.post(url).json(body)).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> ClientResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let error = parse_error_body(status, &body);
            tracing::debug!(endpoint, status = status.as_u16(), name = %error.name, "API error");
            return Err(api_error(status.as_u16(), error));
        }

        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| ClientError::Decode {
                endpoint,
                reason: e.to_string(),
            })?;

        match envelope {
            Envelope {
                status: ref s,
                results: Some(results),
                ..
            } if s == "ok" => Ok(results),
            Envelope {
                error: Some(error),
                ..
            } => Err(api_error(status.as_u16(), error)),
            Envelope { status: s, .. } => Err(ClientError::Decode {
                endpoint,
                reason: format!("envelope status `{s}` without results"),
            }),
        }
    }

    /// `GET /org/projects`
    pub async fn list_projects(&self) -> ClientResult<Vec<ProjectSummary>> {
        self.get("listProjects", &["org", "projects"]).await
    }

    /// `GET /projects/{project}`
    pub async fn get_project(&self, project: &str) -> ClientResult<Value> {
        self.get("getProject", &["projects", project]).await
    }

    /// `GET /projects/{project}/spaces`
    pub async fn list_spaces(&self, project: &str) -> ClientResult<Value> {
        self.get("listSpaces", &["projects", project, "spaces"]).await
    }

    /// `GET /projects/{project}/charts`
    pub async fn list_charts(&self, project: &str) -> ClientResult<Value> {
        self.get("listCharts", &["projects", project, "charts"]).await
    }

    /// `GET /projects/{project}/dashboards`
    pub async fn list_dashboards(&self, project: &str) -> ClientResult<Value> {
        self.get("listDashboards", &["projects", project, "dashboards"])
            .await
    }

    /// `GET /projects/{project}/custom-metrics`
    pub async fn get_custom_metrics(&self, project: &str) -> ClientResult<Value> {
        self.get("getCustomMetrics", &["projects", project, "custom-metrics"])
            .await
    }

    /// `GET /projects/{project}/dataCatalog`
    pub async fn get_catalog(&self, project: &str) -> ClientResult<Value> {
        self.get("getCatalog", &["projects", project, "dataCatalog"])
            .await
    }

    /// `GET /projects/{project}/dataCatalog/metrics`
    pub async fn get_metrics_catalog(&self, project: &str) -> ClientResult<Value> {
        self.get(
            "getMetricsCatalog",
            &["projects", project, "dataCatalog", "metrics"],
        )
        .await
    }

    /// `GET /projects/{project}/charts/code`
    pub async fn get_charts_as_code(&self, project: &str) -> ClientResult<Value> {
        self.get("getChartsAsCode", &["projects", project, "charts", "code"])
            .await
    }

    /// `GET /projects/{project}/dashboards/code`
    pub async fn get_dashboards_as_code(&self, project: &str) -> ClientResult<Value> {
        self.get(
            "getDashboardsAsCode",
            &["projects", project, "dashboards", "code"],
        )
        .await
    }

    /// `GET /projects/{project}/dataCatalog/{table}/metadata`
    pub async fn get_metadata(&self, project: &str, table: &str) -> ClientResult<Value> {
        self.get(
            "getMetadata",
            &["projects", project, "dataCatalog", table, "metadata"],
        )
        .await
    }

    /// `GET /projects/{project}/dataCatalog/{table}/analytics`
    pub async fn get_analytics(&self, project: &str, table: &str) -> ClientResult<Value> {
        self.get(
            "getAnalytics",
            &["projects", project, "dataCatalog", table, "analytics"],
        )
        .await
    }

    /// `GET /org/attributes`
    pub async fn get_user_attributes(&self) -> ClientResult<Value> {
        self.get("getUserAttributes", &["org", "attributes"]).await
    }

    /// `GET /projects/{project}/explores`
    pub async fn list_explores(&self, project: &str) -> ClientResult<Value> {
        self.get("listExplores", &["projects", project, "explores"])
            .await
    }

    /// `GET /projects/{project}/explores/{explore}`
    pub async fn get_explore(&self, project: &str, explore: &str) -> ClientResult<Value> {
        self.get("getExplore", &["projects", project, "explores", explore])
            .await
    }

    /// `POST /projects/{project}/explores/{explore}/runQuery`
    pub async fn run_query(
        &self,
        project: &str,
        query: &MetricQuery,
    ) -> ClientResult<QueryResults> {
        self.post(
            "runQuery",
            &[
                "projects",
                project,
                "explores",
                query.explore_name.as_str(),
                "runQuery",
            ],
            query,
        )
        .await
    }

    /// `GET /saved/{chart}`
    pub async fn get_saved_chart(&self, chart: &str) -> ClientResult<Value> {
        self.get("getSavedChart", &["saved", chart]).await
    }

    /// `POST /saved/{chart}/results`
    pub async fn run_saved_chart(&self, chart: &str) -> ClientResult<QueryResults> {
        self.post(
            "runSavedChart",
            &["saved", chart, "results"],
            &Map::<String, Value>::new(),
        )
        .await
    }

    /// `GET /dashboards/{dashboard}`
    pub async fn get_dashboard(&self, dashboard: &str) -> ClientResult<Value> {
        self.get("getDashboard", &["dashboards", dashboard]).await
    }

    /// `GET /user`
    pub async fn get_current_user(&self) -> ClientResult<Value> {
        self.get("getCurrentUser", &["user"]).await
    }
}

fn api_error(status: u16, error: ApiError) -> ClientError {
    ClientError::Api {
        status,
        message: enrich_error(&error),
        error,
    }
}

/// Structured error from a failed response, or a synthetic one named after
/// the HTTP reason phrase when the body is not a Lightdash error envelope.
fn parse_error_body(status: StatusCode, body: &str) -> ApiError {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error;
    }
    let name = status
        .canonical_reason()
        .map_or_else(|| "HttpError".to_string(), |r| r.replace(' ', ""));
    let trimmed = body.trim();
    if trimmed.is_empty() {
        ApiError::new(name)
    } else {
        ApiError::new(name).with_message(truncate_utf8(trimmed, MAX_ERROR_BODY_BYTES))
    }
}

fn truncate_utf8(input: &str, max_bytes: usize) -> String {
    if input.len() <= max_bytes {
        return input.to_string();
    }
    let mut end = max_bytes;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &input[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryRequest;
    use crate::retry::is_retryable;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROJECT: &str = "3675b69e-8324-4110-bdca-059031aa8da3";

    fn client(server: &MockServer) -> LightdashClient {
        LightdashClient::new(&server.uri(), "pat-123", Duration::from_secs(5))
            .expect("test client must build")
    }

    fn ok(results: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "results": results}))
    }

    #[tokio::test]
    async fn sends_api_key_and_unwraps_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/org/projects"))
            .and(header("authorization", "ApiKey pat-123"))
            .respond_with(ok(json!([
                {"projectUuid": PROJECT, "name": "Jaffle shop", "type": "DEFAULT"}
            ])))
            .mount(&server)
            .await;

        let projects = client(&server).list_projects().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].project_uuid, PROJECT);
        assert_eq!(projects[0].project_type.as_deref(), Some("DEFAULT"));
    }

    #[tokio::test]
    async fn error_envelope_becomes_enriched_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/projects/{PROJECT}/explores/nope")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "status": "error",
                "error": {"statusCode": 404, "name": "NotFoundError", "message": "Explore not found"}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .get_explore(PROJECT, "nope")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(
            err.to_string(),
            "Lightdash API error: NotFoundError, Explore not found (HTTP 404)"
        );
        assert!(!is_retryable(&err.to_string()));
    }

    #[tokio::test]
    async fn server_errors_stay_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/user"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let err = client(&server).get_current_user().await.unwrap_err();
        assert_eq!(err.status(), Some(502));
        let msg = err.to_string();
        assert!(msg.starts_with("Lightdash API error: BadGateway, <html>"));
        assert!(is_retryable(&msg));
    }

    #[tokio::test]
    async fn transport_errors_omit_the_url() {
        // Nothing listens on port 9 of the loopback interface.
        let client = LightdashClient::new(
            &format!("http://127.0.0.1:9/projects/{PROJECT}"),
            "pat",
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.get_project(PROJECT).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert!(!err.to_string().contains(PROJECT));
        assert!(is_retryable(&err.to_string()));
    }

    #[tokio::test]
    async fn run_query_posts_qualified_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!(
                "/api/v1/projects/{PROJECT}/explores/orders/runQuery"
            )))
            .and(body_partial_json(json!({
                "exploreName": "orders",
                "dimensions": ["orders_status"],
                "metrics": ["orders_count"],
                "filters": {},
                "limit": 500
            })))
            .respond_with(ok(json!({
                "rows": [{"orders_count": {"value": {"raw": 42, "formatted": "42"}}}],
                "metricQuery": {},
                "cacheMetadata": {"cacheHit": false}
            })))
            .mount(&server)
            .await;

        let query = QueryRequest {
            dimensions: Some(vec!["status".into()]),
            metrics: Some(vec!["count".into()]),
            ..QueryRequest::new("orders")
        }
        .to_metric_query()
        .unwrap();

        let results = client(&server).run_query(PROJECT, &query).await.unwrap();
        let rows = results.rows.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(results.extra["cacheMetadata"], json!({"cacheHit": false}));
    }

    #[tokio::test]
    async fn path_segments_are_escaped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!(
                "/api/v1/projects/{PROJECT}/dataCatalog/my%20table/metadata"
            )))
            .respond_with(ok(json!({"name": "my table"})))
            .mount(&server)
            .await;

        let meta = client(&server)
            .get_metadata(PROJECT, "my table")
            .await
            .unwrap();
        assert_eq!(meta["name"], "my table");
    }

    #[tokio::test]
    async fn base_url_with_path_prefix_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lightdash/api/v1/org/attributes"))
            .respond_with(ok(json!([])))
            .mount(&server)
            .await;

        let client = LightdashClient::new(
            &format!("{}/lightdash/", server.uri()),
            "pat",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.get_user_attributes().await.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/user"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).get_current_user().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Decode {
                endpoint: "getCurrentUser",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unparseable_api_url() {
        let err = LightdashClient::new("not a url", "pat", DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, ClientError::Setup(_)));
    }

    #[test]
    fn non_json_error_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_BYTES * 2);
        let err = parse_error_body(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert_eq!(err.name, "InternalServerError");
        assert!(err.message.unwrap().len() <= MAX_ERROR_BODY_BYTES + '…'.len_utf8());
    }
}
