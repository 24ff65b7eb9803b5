//! Serve command implementation

use anyhow::Context;
use clap::Args;
use lightdash_mcp_core::{Config, Transport};
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing::{info, instrument};

use crate::server::{LightdashServer, ServerOptions, http};

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Transport to serve on (defaults to the configured one)
    #[arg(long, value_enum)]
    pub transport: Option<Transport>,

    /// Interface to bind for the HTTP transport
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind for the HTTP transport
    #[arg(long)]
    pub port: Option<u16>,
}

impl ServeArgs {
    /// Fold command-line overrides into the loaded config.
    fn apply(self, config: &mut Config) {
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(host) = self.host {
            config.http.host = host;
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
    }
}

/// Start the MCP server and run until the client disconnects or Ctrl-C.
#[instrument(name = "cmd_serve", skip_all)]
pub async fn cmd_serve(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);
    let client = super::build_client(&config)?;
    let server = LightdashServer::new(client, ServerOptions::from_config(&config));

    info!(
        transport = %config.transport,
        api_url = %config.api_url,
        default_project = ?config.default_project(),
        "starting MCP server"
    );

    match config.transport {
        Transport::Stdio => serve_stdio(server).await,
        Transport::Http => http::serve_http(server, &config.http).await,
    }
}

async fn serve_stdio(server: LightdashServer) -> anyhow::Result<()> {
    let service = server
        .serve(stdio())
        .await
        .context("failed to start stdio transport")?;
    info!("awaiting MCP client on stdio");

    tokio::select! {
        result = service.waiting() => {
            result.context("MCP service failed")?;
            info!("MCP client disconnected");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl-C, shutting down MCP server");
        }
    }
    Ok(())
}
