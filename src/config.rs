use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::db::target::DomainAlias;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CairnConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub health: HealthConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    /// Project used by unscoped calls. Global when unset.
    pub default_project: Option<String>,
    /// Hosted replica URL (`libsql://…`). Takes precedence over `db_path`.
    pub remote_url: Option<String>,
    pub remote_token: Option<String>,
    pub domain_alias: Option<DomainAlias>,
    /// Bearer credentials accepted by the HTTP transport.
    pub credentials: Vec<CredentialEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialEntry {
    pub bearer: String,
    pub endpoint: String,
    pub token: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"openai"` (any OpenAI-compatible endpoint) or `"none"`.
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    /// Name of the env var holding the API key.
    pub api_key_env: String,
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub search_limit: usize,
    pub context_limit: usize,
    pub list_limit: usize,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityMode {
    #[default]
    Quick,
    Full,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    /// How long tool responses reuse the last health result.
    pub refresh_secs: u64,
    pub integrity_mode: IntegrityMode,
    /// Deleted/total ratio at which the backlog warning fires.
    pub backlog_ratio: f64,
    /// Stores with fewer deleted rows than this never warn.
    pub backlog_min_deleted: u64,
    pub vacuum_age_days: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 8787,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_cairn_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            default_project: None,
            remote_url: None,
            remote_token: None,
            domain_alias: None,
            credentials: Vec::new(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            endpoint: "https://api.openai.com/v1".into(),
            model: "text-embedding-3-small".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            batch_size: 32,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_limit: 20,
            context_limit: 10,
            list_limit: 50,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_secs: 300,
            integrity_mode: IntegrityMode::Quick,
            backlog_ratio: 0.7,
            backlog_min_deleted: 200,
            vacuum_age_days: 30,
        }
    }
}

/// Returns `~/.cairn/`
pub fn default_cairn_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cairn")
}

/// Returns the default config file path: `~/.cairn/config.toml`
pub fn default_config_path() -> PathBuf {
    default_cairn_dir().join("config.toml")
}

impl CairnConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            CairnConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (CAIRN_DB, CAIRN_PROJECT,
    /// CAIRN_LOG_LEVEL, CAIRN_REMOTE_URL, CAIRN_REMOTE_TOKEN).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CAIRN_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("CAIRN_PROJECT") {
            self.storage.default_project = Some(val).filter(|p| !p.trim().is_empty());
        }
        if let Ok(val) = std::env::var("CAIRN_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("CAIRN_REMOTE_URL") {
            self.storage.remote_url = Some(val);
        }
        if let Ok(val) = std::env::var("CAIRN_REMOTE_TOKEN") {
            self.storage.remote_token = Some(val);
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn default_project(&self) -> Option<&str> {
        self.storage
            .default_project
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
