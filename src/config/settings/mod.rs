
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::database::params::{IndexConfig, SearchConfig};
use crate::embeddings::chunking::{ChunkingConfig, MAX_CHUNK_SIZE};

pub const CONFIG_DIR_NAME: &str = ".docvec-mcp";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
pub const MAX_EMBEDDING_DIMENSION: usize = 32_768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Vector store connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Database URI. `memory://` selects the in-process store; unset means
    /// `vectors/` under the config directory.
    pub uri: Option<String>,
    pub connect_attempts: u32,
    pub connect_backoff_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: None,
            connect_attempts: 10,
            connect_backoff_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/embeddings` HTTP endpoint
    #[default]
    OpenAi,
    /// Offline character-code embedder
    Ascii,
}

impl fmt::Display for ProviderKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => f.write_str("openai"),
            Self::Ascii => f.write_str("ascii"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    pub api_base: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-ada-002".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid API key variable: {0} (cannot be empty)")]
    InvalidApiKeyEnv(String),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 32768)")]
    InvalidEmbeddingDimension(usize),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid store URI: {0} (cannot be empty)")]
    InvalidStoreUri(String),
    #[error("Invalid connect attempts: {0} (must be between 1 and 100)")]
    InvalidConnectAttempts(u32),
    #[error("Invalid chunk size: {0} (must be between 1 and 1024)")]
    InvalidChunkSize(usize),
    #[error("Invalid partition count: {0} (must be between 1 and 65536)")]
    InvalidPartitions(u32),
    #[error("Invalid probe count: {0} (must be between 1 and 65536)")]
    InvalidProbes(u32),
    #[error("Invalid top_k: {0} (must be between 1 and 16384)")]
    InvalidTopK(usize),
    #[error("Search metric {search} differs from index metric {index}")]
    MetricMismatch { index: String, search: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory, `~/.docvec-mcp`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR_NAME))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when absent
    #[inline]
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// URI the connector opens
    #[inline]
    pub fn store_uri(&self) -> String {
        self.store.uri.clone().unwrap_or_else(|| {
            self.get_base_dir()
                .join("vectors")
                .to_string_lossy()
                .into_owned()
        })
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.embedding.validate()?;
        self.validate_chunking_config()?;
        self.index.validate()?;
        self.search.validate()?;

        if self.index.metric != self.search.metric {
            return Err(ConfigError::MetricMismatch {
                index: self.index.metric.to_string(),
                search: self.search.metric.to_string(),
            });
        }

        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        // Chunks land in the `text` field, so they share its cap
        if !(1..=MAX_CHUNK_SIZE).contains(&self.chunking.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }
        Ok(())
    }
}

impl StoreConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(uri) = self.uri.as_deref().filter(|uri| uri.trim().is_empty()) {
            return Err(ConfigError::InvalidStoreUri(uri.to_string()));
        }

        if !(1..=100).contains(&self.connect_attempts) {
            return Err(ConfigError::InvalidConnectAttempts(self.connect_attempts));
        }

        Ok(())
    }
}

impl EmbeddingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_EMBEDDING_DIMENSION).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        // The offline embedder needs nothing else
        if self.provider == ProviderKind::Ascii {
            return Ok(());
        }

        self.api_url()?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidApiKeyEnv(self.api_key_env.clone()));
        }

        if !(1..=600).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }

        Ok(())
    }

    /// Base URL of the embeddings API, normalized to end with `/`
    #[inline]
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let base = format!("{}/", self.api_base.trim_end_matches('/'));
        let url = Url::parse(&base).map_err(|_| ConfigError::InvalidUrl(self.api_base.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(self.api_base.clone()));
        }
        Ok(url)
    }

    #[inline]
    pub fn set_api_base(&mut self, api_base: String) -> Result<(), ConfigError> {
        let temp_config = EmbeddingConfig {
            api_base: api_base.clone(),
            ..self.clone()
        };
        temp_config.api_url()?;
        self.api_base = api_base;
        Ok(())
    }

    #[inline]
    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    #[inline]
    pub fn set_dimension(&mut self, dimension: usize) -> Result<(), ConfigError> {
        if !(1..=MAX_EMBEDDING_DIMENSION).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.dimension = dimension;
        Ok(())
    }
}
