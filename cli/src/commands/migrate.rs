// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Migrate Command
//!
//! Implements `letterbox migrate`, which applies the embedded schema
//! migrations so the PostgreSQL schema matches the binary.
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! letterbox migrate
//!
//! # Preview migrations without applying
//! letterbox migrate --dry-run
//! ```
//!
//! # Environment
//!
//! Uses `LETTERBOX_DATABASE_URL` when set, otherwise the configured
//! `spec.storage.database_url`.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use letterbox_core::domain::config::LetterboxConfigManifest;
use letterbox_core::domain::repository::StorageBackend;
use letterbox_core::infrastructure::db::{Database, MIGRATOR};

#[derive(Args)]
pub struct MigrateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: MigrateCommand, config_path: Option<PathBuf>) -> Result<()> {
    println!("{}", "Letterbox Migrate".bold().green());

    let config = LetterboxConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    let mut pg = match config.storage_backend() {
        StorageBackend::PostgreSQL(pg) => pg,
        StorageBackend::InMemory => anyhow::bail!(
            "No database configured. Set LETTERBOX_DATABASE_URL or spec.storage.database_url."
        ),
    };
    pg.max_connections = 1;

    println!("Connecting to database...");
    let db = Database::new(&pg).await?;

    // A fresh database has no tracking table yet
    let applied_count = sqlx::query("SELECT version FROM _sqlx_migrations")
        .fetch_all(db.get_pool())
        .await
        .map(|rows| rows.len())
        .unwrap_or(0);

    let total_migrations = MIGRATOR.iter().count();

    println!(
        "Migration status: {} applied, {} total available.",
        applied_count, total_migrations
    );

    if applied_count >= total_migrations {
        println!("{}", "✓ Database is up to date.".green());
        return Ok(());
    }

    if cmd.dry_run {
        println!("Pending migrations found (Dry Run):");
        for migration in MIGRATOR.iter().skip(applied_count) {
            println!(" - {} {}", migration.version, migration.description);
        }
        println!("Skipping application due to --dry-run");
        return Ok(());
    }

    println!("Applying pending migrations...");
    db.migrate().await?;
    println!("{}", "✓ Database updated successfully.".green());

    Ok(())
}
