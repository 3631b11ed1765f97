// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP server command
//!
//! Loads configuration, builds the storage backend and serves the letterbox
//! API until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use letterbox_core::application::{LetterboxRepositories, LetterboxServices};
use letterbox_core::domain::config::LetterboxConfigManifest;
use letterbox_core::domain::repository::StorageBackend;
use letterbox_core::infrastructure::db::Database;
use letterbox_core::presentation::api;

#[derive(Args)]
pub struct ServeCommand {
    /// Override the configured bind address
    #[arg(long, env = "LETTERBOX_HOST")]
    host: Option<String>,

    /// Override the configured HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Apply pending migrations before serving (PostgreSQL only)
    #[arg(long)]
    migrate: bool,
}

pub async fn execute(cmd: ServeCommand, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = LetterboxConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    if let Some(host) = cmd.host {
        config.spec.network.bind_address = host;
    }
    if let Some(port) = cmd.port {
        config.spec.network.port = port;
    }
    config
        .validate()
        .context("Configuration validation failed")?;

    info!("Configuration loaded: name={}", config.metadata.name);

    if let Some(port) = config.metrics_port() {
        let addr: SocketAddr = format!("{}:{}", config.spec.network.bind_address, port)
            .parse()
            .with_context(|| format!("Invalid metrics address for port {}", port))?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics listening on {}", addr);
    }

    let backend = config.storage_backend();
    let pool = match &backend {
        StorageBackend::PostgreSQL(pg) => {
            let db = Database::new(pg).await?;
            if cmd.migrate {
                db.migrate().await?;
                info!("Database migrations applied");
            }
            Some(db.get_pool().clone())
        }
        StorageBackend::InMemory => {
            if cmd.migrate {
                warn!("--migrate ignored: in-memory storage has no schema");
            }
            warn!("Using in-memory storage; all data is lost on shutdown");
            None
        }
    };

    let repositories = LetterboxRepositories::create(&backend, pool)
        .context("Failed to initialize repositories")?;
    let app = api::app(LetterboxServices::new(repositories));

    let addr = format!("{}:{}", config.spec.network.bind_address, config.spec.network.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Letterbox listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Letterbox shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
