//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_STORE__BACKEND`).
//! Provides a helper to expand `~` and `${VAR}` in paths such as the LanceDB
//! location.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment, env_name: env_name.to_string() })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment, env_name: "custom".to_string() }
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::ConfigurationError(format!("failed to get '{key}': {e}")))
    }

    /// Extracts and validates the typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::ConfigurationError(e.to_string()))?;
        settings.validate_for_env(&self.env_name)?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub cache: CacheSettings,
    pub timeouts: TimeoutSettings,
    pub llm: LlmSettings,
    pub prompt: PromptSettings,
    pub ingest: IngestSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Flat,
    Lance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub lance_uri: String,
    pub table: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Flat,
            lance_uri: "~/.local/share/ragchat/lancedb".to_string(),
            table: "documents".to_string(),
        }
    }
}

impl StoreSettings {
    pub fn lance_path(&self) -> PathBuf {
        expand_path(&self.lance_uri)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingKind {
    Hash,
    BgeM3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingKind,
    pub dim: usize,
    pub model_dir: Option<String>,
    pub max_len: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { provider: EmbeddingKind::Hash, dim: 1024, model_dir: None, max_len: 256 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub summarize: bool,
    pub web_max_results: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 3, summarize: true, web_max_results: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum EvictionSettings {
    None,
    Lru { capacity: usize },
    Ttl { ttl_seconds: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub eviction: EvictionSettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { eviction: EvictionSettings::None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub llm_seconds: u64,
    pub web_search_seconds: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self { llm_seconds: 60, web_search_seconds: 15 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub persona: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self { persona: "You are an intelligent document assistant.".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

impl Settings {
    pub fn validate_for_env(&self, env: &str) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(Error::ConfigurationError("retrieval.top_k must be at least 1".into()));
        }
        if self.embedding.dim == 0 {
            return Err(Error::ConfigurationError("embedding.dim must be at least 1".into()));
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(Error::ConfigurationError(format!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap, self.ingest.chunk_size
            )));
        }
        if self.store.backend == StoreBackend::Lance && self.store.lance_uri.trim().is_empty() {
            return Err(Error::ConfigurationError("store.lance_uri is required for the lance backend".into()));
        }
        match self.cache.eviction {
            EvictionSettings::Lru { capacity: 0 } => {
                return Err(Error::ConfigurationError("cache.eviction.capacity must be at least 1".into()));
            }
            EvictionSettings::Ttl { ttl_seconds: 0 } => {
                return Err(Error::ConfigurationError("cache.eviction.ttl_seconds must be at least 1".into()));
            }
            _ => {}
        }
        match env {
            "prod" | "production" => {
                if self.embedding.provider == EmbeddingKind::Hash {
                    return Err(Error::ConfigurationError(
                        "production requires a model-backed embedding provider".into(),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
