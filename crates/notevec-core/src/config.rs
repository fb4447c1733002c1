//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `notevec.toml` + `notevec.<env>.toml` + `APP_*` env vars
//! into a typed [`EngineConfig`]. Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against a known base directory.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use secrecy::Secret;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::Scope;

pub const DEFAULT_CONFIG_FILE: &str = "notevec.toml";

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load `notevec.toml` from the working directory plus env overlays.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from an explicit base file (falls back to `notevec.toml`).
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let base = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);

        let mut figment = Figment::new().merge(Toml::file(&base));
        if let Some(suffix) = env_suffix(&env_name) {
            figment = figment.merge(Toml::file(base.with_extension(format!("{suffix}.toml"))));
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.engine()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Extract and validate the full engine configuration.
    pub fn engine(&self) -> Result<EngineConfig> {
        let engine: EngineConfig = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        engine.validate()?;
        Ok(engine)
    }
}

fn env_suffix(env: &str) -> Option<&'static str> {
    match env {
        "dev" | "development" => Some("dev"),
        "prod" | "production" => Some("prod"),
        "test" | "testing" => Some("test"),
        _ => None,
    }
}

/// Everything the engine needs, constructed once at startup and passed down.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub corpus: CorpusConfig,
    pub chunking: ChunkingConfig,
    pub embedding: ProviderConfig,
    pub indexer: IndexerConfig,
    pub search: SearchConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            return Err(Error::InvalidConfig("chunking.max_chars must be positive".into()));
        }
        if self.indexer.batch_size == 0 {
            return Err(Error::InvalidConfig("indexer.batch_size must be positive".into()));
        }
        if self.embedding.dimensions == 0 {
            return Err(Error::InvalidConfig("embedding.dimensions must be positive".into()));
        }
        if self.corpus.extensions.is_empty() {
            return Err(Error::InvalidConfig("corpus.extensions must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub root: String,
    /// Relative values resolve against `root`.
    pub index_path: String,
    pub extensions: Vec<String>,
    /// Named scopes mapped to relative directory prefixes.
    pub scopes: BTreeMap<String, String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        let scopes = BTreeMap::from([
            ("knowledge".to_string(), "knowledge_graph".to_string()),
            ("memory".to_string(), "memory".to_string()),
        ]);
        Self {
            root: "~/claude/obsidian".to_string(),
            index_path: ".vector_index.json".to_string(),
            extensions: vec!["md".to_string()],
            scopes,
        }
    }
}

impl CorpusConfig {
    pub fn root_dir(&self) -> PathBuf {
        expand_path(&self.root)
    }

    pub fn index_file(&self) -> PathBuf {
        resolve_with_base(&self.root_dir(), &self.index_path)
    }

    /// Resolve a scope name: `all` or one of the configured names.
    pub fn scope(&self, name: &str) -> Result<Scope> {
        if name == "all" {
            return Ok(Scope::All);
        }
        self.scopes
            .get(name)
            .map(|prefix| Scope::prefix(name, prefix.as_str()))
            .ok_or_else(|| {
                let known = std::iter::once("all")
                    .chain(self.scopes.keys().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(", ");
                Error::InvalidConfig(format!("unknown scope '{name}' (known: {known})"))
            })
    }

    pub fn named_scopes(&self) -> Vec<Scope> {
        self.scopes
            .iter()
            .map(|(name, prefix)| Scope::prefix(name.as_str(), prefix.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Soft character ceiling per chunk.
    pub max_chars: usize,
    /// Line prefix that starts a new section.
    pub heading_prefix: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 2000, heading_prefix: "## ".to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Remote,
    Local,
    Fake,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub dimensions: usize,
    pub base_url: String,
    pub api_key: Option<Secret<String>>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Directory holding `tokenizer.json`, `config.json` and weights (local models).
    pub model_dir: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Remote,
            model: "text-embedding-3-small".to_string(),
            dimensions: 256,
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            timeout_secs: 30,
            max_retries: 2,
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub batch_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    pub threshold: f32,
    pub preview_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 5, threshold: 0.0, preview_chars: 300 }
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
