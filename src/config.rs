//! Configuration loading.
//!
//! Privy reads an optional TOML file (default `~/.privy/config.toml`), then
//! applies environment overrides. `.env` files are loaded into the process
//! environment first: `./.env`, then `~/.privy/.env`, the latter winning.
//!
//! The resulting [`Config`] is immutable. Switching providers means building
//! a new `Config` and a new generator from it; nothing is patched in place.
//!
//! ```toml
//! [provider]
//! kind = "ollama"            # ollama | gemini | disabled
//!
//! [ollama]
//! base_url = "http://localhost:11434"
//! model = "qwen2.5-coder:1.5b"
//! embed_model = "nomic-embed-text"
//!
//! [index]
//! docs_dir = "/usr/local/share/privy/docs"
//!
//! [retrieval]
//! top_k = 3
//! min_score = 0.3
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// `ollama`, `gemini`, or `disabled`.
    #[serde(default = "default_provider_kind")]
    pub kind: String,
    /// Timeout for a single embedding request.
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,
    /// Retries for HTTP 429 / 5xx / transport errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            embed_timeout_secs: default_embed_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider_kind() -> String {
    "gemini".to_string()
}
fn default_embed_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_ollama_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_ollama_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_ollama_model(),
            embed_model: default_ollama_embed_model(),
            timeout_secs: default_ollama_timeout_secs(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "qwen2.5-coder:1.5b".to_string()
}
fn default_ollama_embed_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_ollama_timeout_secs() -> u64 {
    120
}

#[derive(Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_url")]
    pub base_url: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_gemini_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_url(),
            model: default_gemini_model(),
            embed_model: default_gemini_embed_model(),
            timeout_secs: default_gemini_timeout_secs(),
        }
    }
}

// Keeps the key out of `{:?}` output and therefore out of logs.
impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embed_model", &self.embed_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_gemini_embed_model() -> String {
    "text-embedding-004".to_string()
}
fn default_gemini_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Paragraphs longer than `max_tokens * 4` characters are hard-split.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            docs_dir: default_docs_dir(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_db_path() -> PathBuf {
    privy_home().join("index.sqlite")
}
fn default_docs_dir() -> PathBuf {
    PathBuf::from("/usr/local/share/privy/docs")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}
fn default_max_tokens() -> usize {
    700
}

/// Largest accepted `index.max_tokens`.
pub const MAX_CHUNK_TOKENS: usize = 1_000_000;

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Chunks must score strictly above this to be returned.
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_min_score() -> f32 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    /// Generation rounds per query; all of them spent on checks is a failure.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_check_timeout_secs")]
    pub check_timeout_secs: u64,
    #[serde(default = "default_stdout_limit")]
    pub stdout_limit: usize,
    #[serde(default = "default_stderr_limit")]
    pub stderr_limit: usize,
    /// Number of past turns the REPL keeps for prompt context.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Extra phrases routed to the coder template, on top of the built-ins.
    #[serde(default)]
    pub coder_phrases: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            check_timeout_secs: default_check_timeout_secs(),
            stdout_limit: default_stdout_limit(),
            stderr_limit: default_stderr_limit(),
            history_limit: default_history_limit(),
            coder_phrases: Vec::new(),
        }
    }
}

fn default_max_iterations() -> usize {
    4
}
fn default_check_timeout_secs() -> u64 {
    5
}
fn default_stdout_limit() -> usize {
    2000
}
fn default_stderr_limit() -> usize {
    500
}
fn default_history_limit() -> usize {
    10
}

/// `~/.privy`, or `./.privy` when no home directory can be determined.
pub fn privy_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".privy")
}

pub fn default_config_path() -> PathBuf {
    privy_home().join("config.toml")
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    }
}

/// Load `./.env` and then `~/.privy/.env` into the process environment.
///
/// Both files are optional. Values from the global file replace values from
/// the local one and from the inherited environment.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv_override();
    let _ = dotenvy::from_path_override(privy_home().join(".env"));
}

/// Read the config file (if present), apply environment overrides, validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        Config::default()
    };

    config.apply_env(|key| std::env::var(key).ok());
    config.index.db_path = expand_home(&config.index.db_path.to_string_lossy());
    config.index.docs_dir = expand_home(&config.index.docs_dir.to_string_lossy());
    config.validate()?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

impl Config {
    /// Apply environment overrides using `lookup` as the variable source.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("PRIVY_PROVIDER") {
            self.provider.kind = v.trim().to_lowercase();
        }
        if let Some(v) = non_empty("OLLAMA_BASE_URL") {
            self.ollama.base_url = v;
        }
        if let Some(v) = non_empty("OLLAMA_MODEL") {
            self.ollama.model = v;
        }
        if let Some(v) = non_empty("OLLAMA_EMBED_MODEL") {
            self.ollama.embed_model = v;
        }
        if let Some(v) = non_empty("GEMINI_API_KEY") {
            self.gemini.api_key = Some(v);
        }
        if let Some(v) = non_empty("GEMINI_MODEL") {
            self.gemini.model = v;
        }
        if let Some(v) = non_empty("PRIVY_DOCS_DIR") {
            self.index.docs_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty("PRIVY_DB_PATH") {
            self.index.db_path = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.provider.kind.as_str() {
            "ollama" | "gemini" | "disabled" => {}
            other => bail!(
                "Unknown provider: '{}'. Must be ollama, gemini, or disabled.",
                other
            ),
        }

        if self.index.max_tokens == 0 || self.index.max_tokens > MAX_CHUNK_TOKENS {
            bail!("index.max_tokens must be in 1..={}", MAX_CHUNK_TOKENS);
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_score) {
            bail!("retrieval.min_score must be in [-1.0, 1.0]");
        }
        if self.agent.max_iterations == 0 {
            bail!("agent.max_iterations must be >= 1");
        }
        if self.agent.check_timeout_secs == 0 {
            bail!("agent.check_timeout_secs must be > 0");
        }

        Ok(())
    }
}
