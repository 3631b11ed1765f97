// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Letterbox Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - Storage backend selection (in-memory or PostgreSQL)
// - HTTP bind address and port
// - Logging and metrics settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "letterbox/v1";
pub const KIND: &str = "LetterboxConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LetterboxConfigManifest {
    /// API version (must be "letterbox/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "LetterboxConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: LetterboxConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LetterboxConfigSpec {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_kind")]
    pub backend: StorageKind,

    /// PostgreSQL connection string, required for the postgres backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_kind(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prometheus exporter port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_storage_kind() -> StorageKind {
    StorageKind::InMemory
}

fn default_max_connections() -> u32 {
    5
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for LetterboxConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "letterbox".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: None,
                labels: None,
            },
            spec: LetterboxConfigSpec::default(),
        }
    }
}

impl LetterboxConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. LETTERBOX_CONFIG_PATH environment variable
    /// 2. ./letterbox-config.yaml (working directory)
    /// 3. ~/.letterbox/config.yaml (user home)
    /// 4. /etc/letterbox/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("LETTERBOX_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./letterbox-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".letterbox").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/letterbox/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // An explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("LETTERBOX_DATABASE_URL") {
            tracing::info!("Environment override: LETTERBOX_DATABASE_URL (storage backend -> postgres)");
            self.spec.storage.backend = StorageKind::Postgres;
            self.spec.storage.database_url = Some(url);
        }

        if let Some(port) = lookup("LETTERBOX_PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: LETTERBOX_PORT={}", port);
                    self.spec.network.port = port;
                }
                Err(_) => {
                    tracing::warn!("Invalid value for LETTERBOX_PORT: '{}'. Ignoring.", port);
                }
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.storage.backend == StorageKind::Postgres {
            match &self.spec.storage.database_url {
                Some(url) if !url.is_empty() => {}
                _ => anyhow::bail!("spec.storage.database_url is required for the postgres backend"),
            }
            if self.spec.storage.max_connections == 0 {
                anyhow::bail!("spec.storage.max_connections must be at least 1");
            }
        }

        if self.spec.network.port == 0 {
            anyhow::bail!("spec.network.port cannot be 0");
        }

        Ok(())
    }

    pub fn storage_backend(&self) -> StorageBackend {
        match (self.spec.storage.backend, &self.spec.storage.database_url) {
            (StorageKind::Postgres, Some(url)) => StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: url.clone(),
                max_connections: self.spec.storage.max_connections,
            }),
            _ => StorageBackend::InMemory,
        }
    }

    /// `spec.observability.logging.level`, if the manifest sets one
    pub fn log_level(&self) -> Option<&str> {
        self.spec
            .observability
            .as_ref()
            .and_then(|o| o.logging.as_ref())
            .map(|l| l.level.as_str())
    }

    pub fn metrics_port(&self) -> Option<u16> {
        self.spec
            .observability
            .as_ref()
            .and_then(|o| o.metrics.as_ref())
            .filter(|m| m.enabled)
            .map(|m| m.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_manifest() {
        let manifest = LetterboxConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.metadata.name.is_empty());
        assert_eq!(manifest.spec.storage.backend, StorageKind::InMemory);
        assert_eq!(manifest.spec.network.port, 8000);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = r#"
apiVersion: letterbox/v1
kind: LetterboxConfig
metadata:
  name: test-box
spec:
  storage:
    backend: postgres
    database_url: postgres://localhost/letterbox
  observability:
    metrics:
      port: 9100
"#;
        let manifest = LetterboxConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.metadata.name, "test-box");
        assert_eq!(manifest.log_level(), None);
        assert_eq!(manifest.spec.network.bind_address, "127.0.0.1");
        assert_eq!(manifest.metrics_port(), Some(9100));
        assert!(manifest.validate().is_ok());
        match manifest.storage_backend() {
            StorageBackend::PostgreSQL(cfg) => {
                assert_eq!(cfg.connection_string, "postgres://localhost/letterbox");
                assert_eq!(cfg.max_connections, 5);
            }
            StorageBackend::InMemory => panic!("expected postgres backend"),
        }
    }

    #[test]
    fn test_log_level_from_manifest() {
        let yaml = r#"
apiVersion: letterbox/v1
kind: LetterboxConfig
metadata:
  name: chatty
spec:
  observability:
    logging:
      level: debug
"#;
        let manifest = LetterboxConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.log_level(), Some("debug"));
        assert_eq!(manifest.metrics_port(), None);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "apiVersion: letterbox/v1\nkind: LetterboxConfig\nmetadata:\n  name: from-file\nspec:\n  network:\n    port: 8123"
        )
        .unwrap();

        let manifest = LetterboxConfigManifest::load_or_default(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(manifest.metadata.name, "from-file");
        assert_eq!(manifest.spec.network.port, 8123);
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        let result = LetterboxConfigManifest::load_or_default(Some(PathBuf::from(
            "/nonexistent/letterbox-config.yaml",
        )));
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides() {
        let mut manifest = LetterboxConfigManifest::default();
        manifest.apply_overrides(|key| match key {
            "LETTERBOX_DATABASE_URL" => Some("postgres://db/letters".to_string()),
            "LETTERBOX_PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert_eq!(manifest.spec.storage.backend, StorageKind::Postgres);
        assert_eq!(manifest.spec.network.port, 8000);
        assert!(matches!(manifest.storage_backend(), StorageBackend::PostgreSQL(_)));
    }

    #[test]
    fn test_validation() {
        let mut manifest = LetterboxConfigManifest::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.metadata.name = String::new();
        assert!(manifest.validate().is_err());
        manifest.metadata.name = "box".to_string();

        manifest.spec.storage.backend = StorageKind::Postgres;
        assert!(manifest.validate().is_err());
        manifest.spec.storage.database_url = Some("postgres://localhost/letterbox".to_string());
        assert!(manifest.validate().is_ok());

        manifest.spec.network.port = 0;
        assert!(manifest.validate().is_err());
    }
}
