// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Letterbox CLI
//!
//! The `letterbox` binary runs the HTTP service and its housekeeping.
//!
//! ## Commands
//!
//! - `letterbox serve` - Run the HTTP API
//! - `letterbox migrate [--dry-run]` - Apply PostgreSQL schema migrations
//! - `letterbox config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{ConfigCommand, MigrateCommand, ServeCommand};
use letterbox_core::domain::config::LetterboxConfigManifest;

/// Letterbox - letters between connected users, with approved edits
#[derive(Parser)]
#[command(name = "letterbox")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "LETTERBOX_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Falls back to
    /// `spec.observability.logging.level`, then "info".
    #[arg(long, global = true, env = "LETTERBOX_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    #[command(name = "serve")]
    Serve {
        #[command(flatten)]
        command: ServeCommand,
    },

    /// Apply database migrations
    #[command(name = "migrate")]
    Migrate {
        #[command(flatten)]
        command: MigrateCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Loaded again by the command itself, which reports any load error
    let manifest = LetterboxConfigManifest::load_or_default(cli.config.clone()).ok();
    init_logging(&resolve_log_level(cli.log_level.as_deref(), manifest.as_ref()))?;

    match cli.command {
        Commands::Serve { command } => commands::serve::execute(command, cli.config).await,
        Commands::Migrate { command } => commands::migrate::execute(command, cli.config).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

/// Flag or env value first, then the config file. `RUST_LOG` still wins in `init_logging`.
fn resolve_log_level(flag: Option<&str>, manifest: Option<&LetterboxConfigManifest>) -> String {
    flag.or_else(|| manifest.and_then(|m| m.log_level()))
        .unwrap_or("info")
        .to_string()
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with_level(level: &str) -> LetterboxConfigManifest {
        LetterboxConfigManifest::from_yaml_str(&format!(
            "apiVersion: letterbox/v1\nkind: LetterboxConfig\nmetadata:\n  name: t\nspec:\n  observability:\n    logging:\n      level: {}\n",
            level
        ))
        .unwrap()
    }

    #[test]
    fn test_config_file_level_used_without_flag() {
        let manifest = manifest_with_level("debug");
        assert_eq!(resolve_log_level(None, Some(&manifest)), "debug");
    }

    #[test]
    fn test_flag_overrides_config_file_level() {
        let manifest = manifest_with_level("debug");
        assert_eq!(resolve_log_level(Some("warn"), Some(&manifest)), "warn");
    }

    #[test]
    fn test_default_level_is_info() {
        assert_eq!(resolve_log_level(None, None), "info");
        assert_eq!(resolve_log_level(None, Some(&LetterboxConfigManifest::default())), "info");
    }
}
