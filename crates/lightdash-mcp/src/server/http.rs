//! Streamable HTTP transport.
//!
//! Serves the MCP endpoint at `/mcp` with stateful sessions, plus a plain
//! `GET /health`. Every request must carry an allowed `Host` header, which
//! stops DNS-rebinding pages from reaching a server bound to localhost.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Request, State};
use axum::http::header::{HOST, HeaderName};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use lightdash_mcp_core::HttpConfig;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::{StreamableHttpServerConfig, StreamableHttpService};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use super::LightdashServer;

/// Path of the MCP endpoint.
pub const MCP_PATH: &str = "/mcp";

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);
const SESSION_HEADER: &str = "mcp-session-id";

/// Build the router: `/mcp`, `/health`, CORS and the host check.
pub fn router(server: LightdashServer, config: &HttpConfig) -> Router {
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            sse_keep_alive: Some(SSE_KEEP_ALIVE),
            stateful_mode: true,
            ..Default::default()
        },
    );

    let allowed_hosts: Arc<[String]> = config.effective_allowed_hosts().into();

    Router::new()
        .route("/health", get(health))
        .route_service(MCP_PATH, service)
        .layer(cors_layer(&config.allowed_origins))
        .layer(middleware::from_fn_with_state(allowed_hosts, host_guard))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_HEADER)])
}

/// Reject requests whose `Host` header is not on the allow list.
async fn host_guard(
    State(allowed): State<Arc<[String]>>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok());
    if host.is_some_and(|host| allowed.iter().any(|a| a.eq_ignore_ascii_case(host))) {
        return next.run(request).await;
    }
    warn!(host = ?host, path = %request.uri().path(), "rejected request from disallowed host");
    (StatusCode::FORBIDDEN, "host not allowed").into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Serve until Ctrl-C.
pub async fn serve_http(server: LightdashServer, config: &HttpConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, path = MCP_PATH, "streamable HTTP transport listening");

    axum::serve(listener, router(server, config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP transport stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerOptions;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::http::header::{
        ACCEPT, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, CONTENT_TYPE, ORIGIN,
    };
    use lightdash_mcp_core::LightdashClient;
    use tower::ServiceExt;

    fn app(config: &HttpConfig) -> Router {
        let client = LightdashClient::new("http://127.0.0.1:9", "pat-test", Duration::from_secs(1))
            .expect("test client must build");
        router(LightdashServer::new(client, ServerOptions::default()), config)
    }

    fn get_with_host(uri: &str, host: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().method(Method::GET).uri(uri);
        if let Some(host) = host {
            builder = builder.header(HOST, host);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok_for_allowed_host() {
        let response = app(&HttpConfig::default())
            .oneshot(get_with_host("/health", Some("127.0.0.1:8088")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn localhost_alias_is_allowed_by_default() {
        let response = app(&HttpConfig::default())
            .oneshot(get_with_host("/health", Some("localhost:8088")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn foreign_or_missing_host_is_forbidden() {
        for host in [Some("evil.example.com"), None] {
            let response = app(&HttpConfig::default())
                .oneshot(get_with_host("/health", host))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "host {host:?}");
        }
    }

    #[tokio::test]
    async fn explicit_allowed_hosts_replace_defaults() {
        let config = HttpConfig {
            allowed_hosts: vec!["mcp.internal".into()],
            ..HttpConfig::default()
        };
        let response = app(&config)
            .oneshot(get_with_host("/health", Some("127.0.0.1:8088")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app(&config)
            .oneshot(get_with_host("/health", Some("mcp.internal")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cors_preflight_echoes_allowed_origin() {
        let config = HttpConfig {
            allowed_origins: vec!["https://app.example.com".into()],
            ..HttpConfig::default()
        };
        let request = HttpRequest::builder()
            .method(Method::OPTIONS)
            .uri(MCP_PATH)
            .header(HOST, "127.0.0.1:8088")
            .header(ORIGIN, "https://app.example.com")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = app(&config).oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://app.example.com"
        );
    }

    #[tokio::test]
    async fn cors_ignores_unlisted_origin() {
        let request = HttpRequest::builder()
            .method(Method::GET)
            .uri("/health")
            .header(HOST, "127.0.0.1:8088")
            .header(ORIGIN, "https://other.example.com")
            .body(Body::empty())
            .unwrap();
        let response = app(&HttpConfig::default()).oneshot(request).await.unwrap();
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn initialize_opens_a_session() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "0.0.0"}
            }
        });
        let request = HttpRequest::builder()
            .method(Method::POST)
            .uri(MCP_PATH)
            .header(HOST, "127.0.0.1:8088")
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app(&HttpConfig::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(SESSION_HEADER));
    }
}
