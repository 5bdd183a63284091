use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::embedding::local::LOCAL_DIMENSIONS;
use crate::embedding::openai::{DEFAULT_EMBEDDING_MODEL, known_dimensions};
use crate::memory::DEFAULT_SEARCH_LIMIT;

const DEFAULT_DATABASE: &str = "data/vector_store.db";
const DEFAULT_DIMENSION: usize = 1536;
const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.exa.ai";
const DEFAULT_SEARCH_KEY_ENV: &str = "EXA_API_KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STALENESS_HOURS: u64 = 12;

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a Fantasy IPL Cricket advisor. You provide data-driven insights for fantasy cricket players.
Your advice should be specific, actionable, and based on the latest information provided in the context.
Include relevant statistics, matchup analysis, and injury reports when applicable.
If you're unsure or don't have enough information, acknowledge this and suggest what additional data might help.

Always provide:
1. Specific player recommendations with reasoning
2. Key statistics or trends that support your advice
3. Risk factors or uncertainties to consider
4. Confidence level in your recommendation";

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ModelsConfig {
    #[serde(default = "default_chat_entry")]
    pub chat: ProviderEntry,
    #[serde(default = "default_embedding_entry")]
    pub embedding: ProviderEntry,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat: default_chat_entry(),
            embedding: default_embedding_entry(),
        }
    }
}

fn default_chat_entry() -> ProviderEntry {
    ProviderEntry::openai(DEFAULT_CHAT_MODEL)
}

fn default_embedding_entry() -> ProviderEntry {
    ProviderEntry::openai(DEFAULT_EMBEDDING_MODEL)
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ProviderEntry {
    #[serde(default = "default_provider_type", rename = "type")]
    pub provider_type: String,
    pub model: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderEntry {
    fn openai(model: &str) -> Self {
        Self {
            provider_type: default_provider_type(),
            model: model.to_string(),
            endpoint: None,
            api_key: None,
            api_key_env: Some(DEFAULT_OPENAI_KEY_ENV.to_string()),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn resolve_api_key(&self) -> Result<String, String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_provider_type() -> String {
    "openai".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Prefer an inline key; otherwise read the named environment variable.
fn resolve_key(inline: Option<&str>, env: Option<&str>) -> Result<String, String> {
    if let Some(key) = inline {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }
    match env {
        Some(var_name) => std::env::var(var_name).map_err(|_| {
            format!("environment variable '{var_name}' is not set (required by api_key_env)")
        }),
        None => Ok(String::new()),
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    800
}

/// Live web search used for bulk refreshes and entity-triggered context.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key: None,
            api_key_env: default_search_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SearchConfig {
    pub fn resolve_api_key(&self) -> Result<String, String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_search_endpoint() -> String {
    DEFAULT_SEARCH_ENDPOINT.to_string()
}

fn default_search_key_env() -> Option<String> {
    Some(DEFAULT_SEARCH_KEY_ENV.to_string())
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            dimension: default_dimension(),
        }
    }
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct AdvisorConfig {
    /// Maximum age of the last bulk refresh before a query forces a new one.
    #[serde(default = "default_staleness_hours")]
    pub staleness_hours: u64,
    /// Number of static documents pulled from the vector store per query.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            staleness_hours: default_staleness_hours(),
            search_limit: default_search_limit(),
        }
    }
}

fn default_staleness_hours() -> u64 {
    DEFAULT_STALENESS_HOURS
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file '{}': {e}", path.display()))?;
        Self::parse(&contents)
    }

    /// Read `path` if it exists, otherwise fall back to the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, String> {
        if path.exists() {
            Self::from_file(path)
        } else {
            log::info!("config file '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(contents).map_err(|e| format!("invalid config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.advisor.staleness_hours == 0 {
            return Err("advisor.staleness_hours must be greater than 0".into());
        }
        if self.advisor.search_limit == 0 {
            return Err("advisor.search_limit must be greater than 0".into());
        }
        if self.storage.dimension == 0 {
            return Err("storage.dimension must be greater than 0".into());
        }
        if self.models.chat.provider_type != "openai" {
            return Err(format!(
                "unknown chat provider type '{}'. Valid types: openai",
                self.models.chat.provider_type
            ));
        }
        match self.models.embedding.provider_type.as_str() {
            "openai" | "local" => {}
            other => {
                return Err(format!(
                    "unknown embedding provider type '{other}'. Valid types: openai, local"
                ));
            }
        }
        self.check_embedding_dimension()
    }

    /// Dimension the configured embedding model produces, if it is known.
    pub fn expected_embedding_dimension(&self) -> Option<usize> {
        let entry = &self.models.embedding;
        match entry.provider_type.as_str() {
            "local" => Some(LOCAL_DIMENSIONS),
            _ => known_dimensions(&entry.model),
        }
    }

    /// `storage.dimension` must match the embedding model when its width is
    /// known. Unknown models are trusted.
    pub fn check_embedding_dimension(&self) -> Result<(), String> {
        let configured = self.storage.dimension;
        match self.expected_embedding_dimension() {
            Some(expected) if expected != configured => Err(format!(
                "storage.dimension is {configured} but embedding model '{}' produces {expected}-dimensional vectors",
                self.models.embedding.model
            )),
            _ => Ok(()),
        }
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.models.chat.model, "gpt-3.5-turbo");
        assert_eq!(config.models.embedding.model, "text-embedding-ada-002");
        assert_eq!(config.storage.dimension, 1536);
        assert_eq!(config.storage.database, "data/vector_store.db");
        assert_eq!(config.advisor.staleness_hours, 12);
        assert_eq!(config.advisor.search_limit, 5);
        assert_eq!(config.search.endpoint, "https://api.exa.ai");
        assert!((config.chat.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.chat.max_tokens, 800);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[models.chat]
type = "openai"
model = "gpt-4o-mini"
endpoint = "http://localhost:1234/v1"
api_key = "sk-test"

[models.embedding]
type = "local"
model = "all-MiniLM-L6-v2"

[search]
api_key = "exa-test"
timeout_secs = 10

[storage]
database = "/tmp/crease.db"
dimension = 384

[advisor]
staleness_hours = 6
search_limit = 8
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.models.chat.model, "gpt-4o-mini");
        assert_eq!(config.models.chat.resolve_api_key().unwrap(), "sk-test");
        assert_eq!(config.models.embedding.provider_type, "local");
        assert_eq!(config.search.resolve_api_key().unwrap(), "exa-test");
        assert_eq!(config.search.timeout(), Duration::from_secs(10));
        assert_eq!(config.storage.dimension, 384);
        assert_eq!(config.advisor.staleness_hours, 6);
        assert_eq!(config.advisor.search_limit, 8);
    }

    #[test]
    fn missing_model_in_provider_entry_produces_clear_error() {
        let toml = r#"
[models.chat]
type = "openai"
"#;
        let err = Config::parse(toml).unwrap_err();
        assert!(err.contains("model"), "error should mention model: {err}");
    }

    #[test]
    fn unknown_embedding_type_is_rejected() {
        let toml = r#"
[models.embedding]
type = "word2vec"
model = "x"
"#;
        let err = Config::parse(toml).unwrap_err();
        assert!(err.contains("word2vec"), "error should name the type: {err}");
    }

    #[test]
    fn zero_staleness_window_is_rejected() {
        let err = Config::parse("[advisor]\nstaleness_hours = 0\n").unwrap_err();
        assert!(err.contains("staleness_hours"), "got: {err}");
    }

    #[test]
    fn zero_search_limit_is_rejected() {
        let err = Config::parse("[advisor]\nsearch_limit = 0\n").unwrap_err();
        assert!(err.contains("search_limit"), "got: {err}");
    }

    #[test]
    fn local_embedder_with_default_dimension_is_rejected() {
        let toml = r#"
[models.embedding]
type = "local"
model = "all-MiniLM-L6-v2"
"#;
        let err = Config::parse(toml).unwrap_err();
        assert!(err.contains("storage.dimension is 1536"), "got: {err}");
        assert!(err.contains("384"), "got: {err}");
    }

    #[test]
    fn known_openai_model_must_match_dimension() {
        let toml = r#"
[models.embedding]
type = "openai"
model = "text-embedding-3-large"
"#;
        let err = Config::parse(toml).unwrap_err();
        assert!(err.contains("3072"), "got: {err}");

        let config = Config::parse(&format!("{toml}\n[storage]\ndimension = 3072\n")).unwrap();
        assert_eq!(config.expected_embedding_dimension(), Some(3072));
    }

    #[test]
    fn unknown_openai_model_trusts_configured_dimension() {
        let toml = r#"
[models.embedding]
type = "openai"
model = "my-private-embedder"

[storage]
dimension = 512
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.expected_embedding_dimension(), None);
        assert_eq!(config.storage.dimension, 512);
    }

    #[test]
    fn api_key_env_missing_variable_errors() {
        let entry = ProviderEntry {
            api_key: None,
            api_key_env: Some("CREASE_TEST_SURELY_UNSET_VAR".into()),
            ..ProviderEntry::openai("gpt-4")
        };
        let err = entry.resolve_api_key().unwrap_err();
        assert!(err.contains("CREASE_TEST_SURELY_UNSET_VAR"), "got: {err}");
    }

    #[test]
    fn inline_api_key_wins_over_env() {
        let entry = ProviderEntry {
            api_key: Some("inline".into()),
            api_key_env: Some("CREASE_TEST_SURELY_UNSET_VAR".into()),
            ..ProviderEntry::openai("gpt-4")
        };
        assert_eq!(entry.resolve_api_key().unwrap(), "inline");
    }

    #[test]
    fn load_or_default_reads_specified_file() {
        let dir = std::env::temp_dir().join(format!("crease-config-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("custom.toml");
        std::fs::write(&path, "[storage]\ndatabase = \"custom.db\"\n").unwrap();

        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.storage.database, "custom.db");

        let missing = Config::load_or_default(&dir.join("missing.toml")).unwrap();
        assert_eq!(missing, Config::default());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn toml_round_trip() {
        let config = Config::default();
        let reparsed = Config::parse(&config.to_toml_string()).unwrap();
        assert_eq!(config, reparsed);
    }
}
