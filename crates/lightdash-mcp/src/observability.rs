//! Logging setup for the binary.
//!
//! Human-readable logs always go to stderr, since stdout carries the stdio
//! transport. When a log directory is available, a JSONL copy is written to
//! a daily-rolling file as well.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_PATH_ENV: &str = "LIGHTDASH_MCP_LOG_PATH";
const LOG_DIR_ENV: &str = "LIGHTDASH_MCP_LOG_DIR";
const DEFAULT_LOG_FILE: &str = "lightdash-mcp.jsonl";

/// Where (and whether) to write the JSONL log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Directory for the rolling log file. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    /// File name prefix; the appender adds the date.
    pub log_file: String,
}

impl ObservabilityConfig {
    /// Resolve the log location.
    ///
    /// Precedence: `LIGHTDASH_MCP_LOG_PATH`, `LIGHTDASH_MCP_LOG_DIR`, the
    /// config file's `log_dir`, then the platform data directory.
    pub fn from_env_with_overrides(config_log_dir: Option<PathBuf>) -> Self {
        Self::resolve(
            non_empty_env(LOG_PATH_ENV).map(PathBuf::from),
            non_empty_env(LOG_DIR_ENV).map(PathBuf::from),
            config_log_dir,
            lightdash_mcp_core::config::user_data_local_dir()
                .map(|dir| dir.join("logs").into_std_path_buf()),
        )
    }

    fn resolve(
        log_path: Option<PathBuf>,
        env_dir: Option<PathBuf>,
        config_dir: Option<PathBuf>,
        platform_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = log_path {
            let log_file = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(DEFAULT_LOG_FILE)
                .to_string();
            let log_dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            return Self {
                log_dir: Some(log_dir),
                log_file,
            };
        }
        Self {
            log_dir: env_dir.or(config_dir).or(platform_dir),
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Keeps the file writer flushing until dropped.
#[derive(Debug)]
pub struct ObservabilityGuard {
    _file: Option<WorkerGuard>,
}

/// Build the log filter.
///
/// `RUST_LOG` wins when set. Otherwise `-q` means errors only, `-v` debug,
/// `-vv` trace, and the configured level applies.
pub fn env_filter(quiet: bool, verbose: u8, config_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(filter_directive(quiet, verbose, config_level))
}

fn filter_directive(quiet: bool, verbose: u8, config_level: &str) -> &str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => config_level,
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Install the global subscriber.
///
/// A log directory that cannot be created disables the file layer instead of
/// failing startup.
pub fn init_observability(
    config: &ObservabilityConfig,
    filter: EnvFilter,
) -> anyhow::Result<ObservabilityGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .compact();

    let mut file_warning = None;
    let (file_layer, guard) = match config.log_dir.as_deref() {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, &config.log_file);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_current_span(true);
                (Some(layer), Some(guard))
            }
            Err(err) => {
                file_warning = Some(format!("{}: {err}", dir.display()));
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    if let Some(warning) = file_warning {
        tracing::warn!(error = %warning, "file logging disabled");
    }

    Ok(ObservabilityGuard { _file: guard })
}
