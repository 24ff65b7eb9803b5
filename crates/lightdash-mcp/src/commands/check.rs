//! Check command implementation

use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use lightdash_mcp_core::{Config, ProjectSummary, with_retry};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

/// Arguments for the `check` subcommand.
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Debug, Serialize)]
struct ProjectLine {
    project_uuid: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    api_url: String,
    project_count: usize,
    projects: Vec<ProjectLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_project: Option<String>,
    /// Whether the default project is among the listed ones.
    #[serde(skip_serializing_if = "Option::is_none")]
    default_project_found: Option<bool>,
    elapsed_ms: u128,
}

impl CheckReport {
    fn new(config: &Config, projects: Vec<ProjectSummary>, elapsed: Duration) -> Self {
        let default_project = config.default_project().map(str::to_string);
        let default_project_found = default_project
            .as_deref()
            .map(|uuid| projects.iter().any(|p| p.project_uuid == uuid));
        Self {
            api_url: config.api_url.clone(),
            project_count: projects.len(),
            projects: projects
                .into_iter()
                .map(|p| ProjectLine {
                    project_uuid: p.project_uuid,
                    name: p.name,
                })
                .collect(),
            default_project,
            default_project_found,
            elapsed_ms: elapsed.as_millis(),
        }
    }
}

fn spinner(enabled: bool, api_url: &str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(format!("contacting {api_url}"));
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Verify the API key and URL by listing projects through the retry policy.
#[instrument(name = "cmd_check", skip_all, fields(json_output))]
pub async fn cmd_check(_args: CheckArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    debug!(json_output = global_json, api_url = %config.api_url, "executing check command");

    let client = super::build_client(config)?;
    let progress = spinner(!global_json, &config.api_url);
    let started = Instant::now();
    let result = with_retry(&config.retry_config(), || client.list_projects()).await;
    progress.finish_and_clear();

    let projects =
        result.with_context(|| format!("could not list projects at {}", config.api_url))?;
    let report = CheckReport::new(config, projects, started.elapsed());

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} ({} ms)",
        "✓".green(),
        report.api_url.cyan(),
        report.elapsed_ms
    );
    println!(
        "{}: {}",
        "Projects".dimmed(),
        report.project_count.to_string().bold()
    );
    for project in &report.projects {
        println!("  {} {}", project.project_uuid.dimmed(), project.name);
    }
    match (&report.default_project, report.default_project_found) {
        (Some(uuid), Some(true)) => {
            println!("{}: {}", "Default project".dimmed(), uuid.green());
        }
        (Some(uuid), _) => {
            println!(
                "{}: {} {}",
                "Default project".dimmed(),
                uuid.yellow(),
                "(not visible to this API key)".yellow()
            );
        }
        (None, _) => {}
    }

    Ok(())
}
