//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`APP_LLM__MODEL=mistral` sets `llm.model`). Every key has a default, so a
//! missing config file is not an error. Provides helpers to expand `~` and
//! `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::corpus::ChunkingConfig;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Wrap an already assembled figment, layered over the built-in defaults.
    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config = Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }

    fn validate(&self) -> anyhow::Result<()> {
        let settings = self.settings()?;
        if settings.chunking.window == 0 {
            return Err(crate::error::Error::InvalidConfig("chunking.window must be greater than zero".into()).into());
        }
        if settings.llm.endpoint.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig("llm.endpoint must not be empty".into()).into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub corpus: CorpusSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub history: HistorySettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    /// File extensions (without the dot) that are never read.
    pub excluded_extensions: Vec<String>,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self { excluded_extensions: vec!["pyc".to_string(), "log".to_string()] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Number of chunk texts handed to the embedder per call.
    pub batch_size: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { batch_size: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Local directory holding `config.json`, `tokenizer.json` and weights.
    pub model_dir: Option<String>,
    /// Hugging Face repository used when no local directory is found.
    pub repo_id: String,
    pub max_len: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, repo_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(), max_len: 256 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "llama2".to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Whitespace tokens kept in the running conversation; 0 keeps everything.
    pub max_tokens: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { max_tokens: 2000 }
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

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

/// Make a CLI path absolute against the current directory without touching the filesystem.
pub fn absolutize<S: AsRef<str>>(p: S) -> anyhow::Result<PathBuf> {
    Ok(resolve_with_base(&env::current_dir()?, p))
}
