//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_RETRIEVAL__K=5`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};
use crate::report::DEFAULT_SOURCE_TAG;
use crate::types::DistanceMetric;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub report: ReportSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub chunking: ChunkingConfig,
    pub prompt: PromptSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub path: String,
    pub source_tag: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            path: "hotel_bookings_rag_data.json".to_string(),
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub model_dir: Option<String>,
    pub max_tokens: usize,
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: None,
            max_tokens: 256,
            use_fake: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub k: usize,
    pub metric: DistanceMetric,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { k: 3, metric: DistanceMetric::Euclidean }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Replaces the built-in template; must contain `{context}` and `{question}`.
    pub template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: "127.0.0.1:5000".to_string() }
    }
}

impl Settings {
    /// Parameter checks that must pass before any build work starts.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.retrieval.k == 0 {
            return Err(Error::InvalidConfiguration("retrieval.k must be greater than 0".into()));
        }
        if self.embedding.max_tokens == 0 {
            return Err(Error::InvalidConfiguration("embedding.max_tokens must be greater than 0".into()));
        }
        Ok(())
    }

    /// The report file, resolved against `base` when relative.
    pub fn report_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.report.path)
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfiguration(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the full typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
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
