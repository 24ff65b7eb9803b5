//! Library interface for the `lightdash-mcp` CLI.
//!
//! This crate exposes the CLI's argument parser, command structure and MCP
//! server as a library, primarily for documentation generation and testing.
//! The actual entry point is in `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`Commands`] - Available subcommands
//! - [`commands`] - Command implementations
//! - `server` - MCP tools, resources and prompts over the Lightdash API
//!
//! # Documentation Generation
//!
//! The [`command()`] function returns the clap `Command` for generating man pages
//! and shell completions.

pub mod commands;

#[cfg(feature = "mcp")]
pub mod server;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output based on this choice.
    ///
    /// Call this once at startup to set the color mode.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // owo-colors auto-detects by default
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    LIGHTDASH_API_KEY        Personal access token (required for serve/check)
    LIGHTDASH_API_URL        Lightdash instance URL (default: https://app.lightdash.cloud)
    LIGHTDASH_PROJECT_UUID   Project used when a tool call names none
    LIGHTDASH_HTTP__PORT     Port for the HTTP transport (any key nests with __)
    RUST_LOG                 Log filter (e.g., debug, lightdash_mcp=trace)
    LIGHTDASH_MCP_LOG_PATH   Explicit log file path
    LIGHTDASH_MCP_LOG_DIR    Log directory
";
/// Command-line interface definition for lightdash-mcp.
#[derive(Parser)]
#[command(name = "lightdash-mcp")]
#[command(about = "MCP server exposing the Lightdash analytics API to AI agents", long_about = None)]
#[command(version, arg_required_else_help = true)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Print only the version number (for scripting)
    #[arg(long)]
    pub version_only: bool,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the MCP server (stdio or streamable HTTP)
    #[cfg(feature = "mcp")]
    Serve(commands::serve::ServeArgs),

    /// Verify the API key and URL by listing projects
    Check(commands::check::CheckArgs),

    /// Show package information and effective configuration
    Info(commands::info::InfoArgs),
}

/// Returns the clap command for documentation generation
pub fn command() -> clap::Command {
    Cli::command()
}
