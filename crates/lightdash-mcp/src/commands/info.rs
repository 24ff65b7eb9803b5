//! Info command implementation

use clap::Args;
use lightdash_mcp_core::config::{Config, ConfigSources};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    api_url: String,
    /// Redacted; `None` when unset.
    api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_uuid: Option<String>,
    max_retries: u32,
    retry_delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_retry_delay_ms: Option<u64>,
    request_timeout_secs: u64,
    cache_ttl_secs: u64,
    transport: String,
    http_bind: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    allowed_origins: Vec<String>,
}

impl ConfigInfo {
    fn from_config(config: &Config, sources: &ConfigSources) -> Self {
        Self {
            config_file: sources.primary_file().map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
            api_url: config.api_url.clone(),
            api_key: config.api_key.as_ref().map(|k| k.redacted()),
            project_uuid: config.default_project().map(str::to_string),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
            max_retry_delay_ms: config.max_retry_delay_ms,
            request_timeout_secs: config.request_timeout_secs,
            cache_ttl_secs: config.cache_ttl_secs,
            transport: config.transport.to_string(),
            http_bind: config.http.bind_addr(),
            allowed_origins: config.http.allowed_origins.clone(),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
}

/// Print package information and the effective configuration.
///
/// The API key is only ever shown redacted.
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    sources: &ConfigSources,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let full_info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, sources),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&full_info)?);
        return Ok(());
    }

    let package = &full_info.package;
    println!("{} {}", package.name.bold(), package.version.green());
    if !package.description.is_empty() {
        println!("{}", package.description);
    }
    if !package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), package.license);
    }
    if !package.repository.is_empty() {
        println!("{}: {}", "Repository".dimmed(), package.repository.cyan());
    }

    let cfg = &full_info.config;
    println!();
    println!("{}", "Configuration".bold().underline());
    match cfg.config_file {
        Some(ref path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none loaded".yellow()),
    }
    println!("{}: {}", "Log level".dimmed(), cfg.log_level);
    if let Some(ref dir) = cfg.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }

    println!();
    println!("{}", "Lightdash".bold().underline());
    println!("{}: {}", "API URL".dimmed(), cfg.api_url.cyan());
    match cfg.api_key {
        Some(ref key) => println!("{}: {}", "API key".dimmed(), key),
        None => println!("{}: {}", "API key".dimmed(), "not set".red()),
    }
    print_opt("Default project", &cfg.project_uuid);
    println!(
        "{}: {} attempts, {} ms initial delay",
        "Retry".dimmed(),
        cfg.max_retries,
        cfg.retry_delay_ms
    );
    print_opt("Max retry delay (ms)", &cfg.max_retry_delay_ms);
    println!("{}: {}s", "Request timeout".dimmed(), cfg.request_timeout_secs);
    println!("{}: {}s", "Cache TTL".dimmed(), cfg.cache_ttl_secs);

    println!();
    println!("{}", "Server".bold().underline());
    println!("{}: {}", "Transport".dimmed(), cfg.transport);
    println!("{}: {}", "HTTP bind".dimmed(), cfg.http_bind);
    if !cfg.allowed_origins.is_empty() {
        println!(
            "{}: {}",
            "Allowed origins".dimmed(),
            cfg.allowed_origins.join(", ")
        );
    }

    Ok(())
}

/// Print an optional value or "(not set)".
fn print_opt<T: std::fmt::Display>(label: &str, value: &Option<T>) {
    match value {
        Some(v) => println!("{}: {}", label.dimmed(), v),
        None => println!("{}: {}", label.dimmed(), "(not set)".dimmed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightdash_mcp_core::ApiKey;

    #[test]
    fn test_cmd_info_text_succeeds() {
        let result = cmd_info(
            InfoArgs::default(),
            false,
            &Config::default(),
            &ConfigSources::default(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_cmd_info_json_via_global() {
        let result = cmd_info(
            InfoArgs::default(),
            true,
            &Config::default(),
            &ConfigSources::default(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_info_no_file() {
        let info = ConfigInfo::from_config(&Config::default(), &ConfigSources::default());
        assert!(info.config_file.is_none());
        assert_eq!(info.log_level, "info");
        assert!(info.api_key.is_none());
        assert_eq!(info.transport, "stdio");
    }

    #[test]
    fn api_key_is_redacted() {
        let config = Config {
            api_key: Some(ApiKey::new("ldpat_supersecret_9f3a")),
            ..Config::default()
        };
        let info = ConfigInfo::from_config(&config, &ConfigSources::default());
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("supersecret"));
        assert!(json.contains("9f3a"));
    }
}
