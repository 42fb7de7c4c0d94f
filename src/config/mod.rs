//! Configuration management for curator
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! API keys are never stored in the file; the config names the environment
//! variables they are read from.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Qdrant connection URL
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Environment variable name for Qdrant API key
    #[serde(default = "default_qdrant_api_key_env")]
    pub qdrant_api_key_env: String,

    /// Qdrant collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Page rendering configuration
    #[serde(default)]
    pub render: RenderConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    /// Environment variable name for the provider API key
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,

    /// Embedding model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Multimodal model used to caption images
    #[serde(default = "default_caption_model")]
    pub caption_model: String,

    /// Embedding dimension (must match model and collection)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Concurrent embedding calls per ingestion run
    #[serde(default = "default_embedding_concurrency")]
    pub concurrency: usize,
}

/// Page rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Render pages with a headless browser (requires the js-rendering
    /// feature; falls back to a plain HTTP fetch otherwise)
    #[serde(default = "default_js_rendering")]
    pub js_rendering: bool,

    /// Page load timeout in seconds
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u64,

    /// Time to wait after load for dynamic content (milliseconds)
    #[serde(default = "default_render_wait")]
    pub render_wait_ms: u64,

    /// Disable browser sandbox (required in some Docker/CI environments)
    #[serde(default)]
    pub no_sandbox: bool,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default number of results
    #[serde(default = "default_query_k")]
    pub default_k: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for curator data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qdrant_url: default_qdrant_url(),
            qdrant_api_key_env: default_qdrant_api_key_env(),
            collection_name: default_collection_name(),
            embedding: EmbeddingConfig::default(),
            render: RenderConfig::default(),
            query: QueryConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            api_key_env: default_embedding_api_key_env(),
            model: default_embedding_model(),
            caption_model: default_caption_model(),
            dimension: default_embedding_dimension(),
            concurrency: default_embedding_concurrency(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            js_rendering: default_js_rendering(),
            timeout_secs: default_render_timeout(),
            render_wait_ms: default_render_wait(),
            no_sandbox: false,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_k: default_query_k(),
        }
    }
}

impl EmbeddingConfig {
    /// Get the provider API key from environment
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok()
    }
}

impl Config {
    /// Get the default base directory for curator (~/.curator)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".curator")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to
    /// defaults when no file exists yet
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Get the Qdrant API key from environment
    pub fn qdrant_api_key(&self) -> Option<String> {
        std::env::var(&self.qdrant_api_key_env).ok()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }

        if self.embedding.concurrency == 0 || self.embedding.concurrency > 32 {
            return Err(Error::Config(
                "embedding.concurrency must be between 1 and 32".to_string(),
            ));
        }

        if Url::parse(&self.embedding.endpoint).is_err() {
            return Err(Error::Config(format!(
                "embedding.endpoint is not a valid URL: {}",
                self.embedding.endpoint
            )));
        }

        if self.query.default_k == 0 {
            return Err(Error::Config(
                "query.default_k must be positive".to_string(),
            ));
        }

        if self.render.timeout_secs == 0 {
            return Err(Error::Config(
                "render.timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.collection_name, "website_content");
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.query.default_k, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.collection_name = "test_collection".to_string();
        config.embedding.concurrency = 8;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.collection_name, "test_collection");
        assert_eq!(loaded.embedding.concurrency, 8);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.embedding.concurrency = 0;
        assert!(config.validate().is_err());

        config.embedding.concurrency = 4;
        assert!(config.validate().is_ok());

        config.embedding.dimension = 0;
        assert!(config.validate().is_err());

        config.embedding.dimension = 768;
        config.embedding.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
