//! `lightdash://` resources.
//!
//! Resources are read-only JSON views of project-level API responses. Reads
//! go through the server's TTL cache, keyed by URI, so repeated reads of the
//! large catalogs don't hit the API every time.

use std::fmt;

use lightdash_mcp_core::ProjectSummary;
use rmcp::ErrorData as McpError;
use rmcp::model::{AnnotateAble, RawResource, Resource};
use serde_json::Value;

use super::LightdashServer;
use super::error::ToMcpResult;

const SCHEME: &str = "lightdash://";
const PROJECTS_URI: &str = "lightdash://projects";
const JSON_MIME: &str = "application/json";

/// Per-project resource kinds, in listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProjectResource {
    Catalog,
    MetricsCatalog,
    Explores,
    ChartsAsCode,
    DashboardsAsCode,
}

impl ProjectResource {
    const ALL: [Self; 5] = [
        Self::Catalog,
        Self::MetricsCatalog,
        Self::Explores,
        Self::ChartsAsCode,
        Self::DashboardsAsCode,
    ];

    const fn slug(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::MetricsCatalog => "metrics-catalog",
            Self::Explores => "explores",
            Self::ChartsAsCode => "charts-as-code",
            Self::DashboardsAsCode => "dashboards-as-code",
        }
    }

    fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.slug() == slug)
    }

    const fn title(self) -> &'static str {
        match self {
            Self::Catalog => "data catalog",
            Self::MetricsCatalog => "metrics catalog",
            Self::Explores => "explores",
            Self::ChartsAsCode => "charts as code",
            Self::DashboardsAsCode => "dashboards as code",
        }
    }
}

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ResourceUri {
    Projects,
    Project {
        project: String,
        kind: ProjectResource,
    },
}

impl ResourceUri {
    fn parse(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix(SCHEME)?;
        let mut parts = rest.split('/');
        if parts.next()? != "projects" {
            return None;
        }
        match (parts.next(), parts.next(), parts.next()) {
            (None, _, _) => Some(Self::Projects),
            (Some(project), Some(slug), None) if !project.is_empty() => Some(Self::Project {
                project: project.to_string(),
                kind: ProjectResource::from_slug(slug)?,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Projects => f.write_str(PROJECTS_URI),
            Self::Project { project, kind } => {
                write!(f, "{PROJECTS_URI}/{project}/{}", kind.slug())
            }
        }
    }
}

fn json_resource(uri: String, name: String, description: String) -> Resource {
    let mut raw = RawResource::new(uri, name);
    raw.description = Some(description);
    raw.mime_type = Some(JSON_MIME.to_string());
    raw.no_annotation()
}

impl LightdashServer {
    /// The project list plus one resource per project and kind.
    pub(super) async fn resources(&self) -> Result<Vec<Resource>, McpError> {
        let projects: Vec<ProjectSummary> =
            serde_json::from_str(&self.read_resource_text(PROJECTS_URI).await?)
                .mcp_context("cached project list is not valid JSON")?;

        let mut resources = Vec::with_capacity(1 + projects.len() * ProjectResource::ALL.len());
        resources.push(json_resource(
            PROJECTS_URI.to_string(),
            "Projects".to_string(),
            "All projects in the organization".to_string(),
        ));
        for project in &projects {
            for kind in ProjectResource::ALL {
                let uri = ResourceUri::Project {
                    project: project.project_uuid.clone(),
                    kind,
                };
                resources.push(json_resource(
                    uri.to_string(),
                    format!("{} {}", project.name, kind.title()),
                    format!("The {} of project {}", kind.title(), project.name),
                ));
            }
        }
        tracing::debug!(count = resources.len(), "listed resources");
        Ok(resources)
    }

    /// JSON text of a resource, from the cache when fresh.
    #[tracing::instrument(skip(self), fields(otel.kind = "server"))]
    pub(super) async fn read_resource_text(&self, uri: &str) -> Result<String, McpError> {
        let parsed = ResourceUri::parse(uri).ok_or_else(|| {
            McpError::invalid_params(format!("unknown resource URI: {uri}"), None)
        })?;
        let key = parsed.to_string();
        self.cache
            .get_or_try_insert_with(&key, || self.fetch_resource(&parsed))
            .await
    }

    async fn fetch_resource(&self, uri: &ResourceUri) -> Result<String, McpError> {
        let value: Value = match uri {
            ResourceUri::Projects => {
                let projects = self.call(|| self.client.list_projects()).await?;
                serde_json::to_value(projects).mcp_context("serialization error")?
            }
            ResourceUri::Project { project, kind } => match kind {
                ProjectResource::Catalog => self.call(|| self.client.get_catalog(project)).await?,
                ProjectResource::MetricsCatalog => {
                    self.call(|| self.client.get_metrics_catalog(project))
                        .await?
                }
                ProjectResource::Explores => {
                    self.call(|| self.client.list_explores(project)).await?
                }
                ProjectResource::ChartsAsCode => {
                    self.call(|| self.client.get_charts_as_code(project))
                        .await?
                }
                ProjectResource::DashboardsAsCode => {
                    self.call(|| self.client.get_dashboards_as_code(project))
                        .await?
                }
            },
        };
        serde_json::to_string_pretty(&value).mcp_context("serialization error")
    }
}
