//! Runtime wiring.
//!
//! Turns a parsed [`Config`] into the embedder, vector store and advisor the
//! binaries share. Nothing here is CLI-specific; any front end can call it.

use std::path::Path;
use std::sync::Arc;

use crate::advisor::{Advisor, AdvisorSettings};
use crate::config::Config;
use crate::embedding::Embedder;
use crate::embedding::local::LocalEmbedder;
use crate::embedding::openai::OpenAiEmbedder;
use crate::fetcher::exa::ExaFetcher;
use crate::generator::openai::OpenAiGenerator;
use crate::memory::VectorStore;

/// The advisor as configured for production use.
pub type DefaultAdvisor = Advisor<ExaFetcher, OpenAiGenerator>;

/// Build the embedder named by `[models.embedding]`.
pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>, String> {
    config.check_embedding_dimension()?;
    let entry = &config.models.embedding;
    match entry.provider_type.as_str() {
        "local" => {
            let embedder = LocalEmbedder::new()
                .map_err(|e| format!("failed to initialize local embedder: {e}"))?;
            Ok(Arc::new(embedder))
        }
        "openai" => {
            let api_key = entry.resolve_api_key()?;
            let embedder = OpenAiEmbedder::new(entry, api_key, config.storage.dimension)
                .map_err(|e| format!("failed to initialize embedder: {e}"))?;
            Ok(Arc::new(embedder))
        }
        other => Err(format!("unknown embedding provider type '{other}'")),
    }
}

/// Open the vector store at `storage.database`, creating parent directories.
pub fn build_vector_store(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Arc<VectorStore>, String> {
    let path = Path::new(&config.storage.database);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create '{}': {e}", parent.display()))?;
    }
    let store = VectorStore::open(path, embedder, config.storage.dimension)
        .map_err(|e| format!("failed to open vector store '{}': {e}", path.display()))?;
    Ok(Arc::new(store))
}

/// Build the advisor around an already-opened store.
pub fn build_advisor_with_store(config: &Config, store: Arc<VectorStore>) -> Result<DefaultAdvisor, String> {
    let search_key = config.search.resolve_api_key()?;
    let fetcher = ExaFetcher::new(&config.search, search_key)
        .map_err(|e| format!("failed to initialize search client: {e}"))?;

    let chat = &config.models.chat;
    let chat_key = chat.resolve_api_key()?;
    let generator = OpenAiGenerator::new(chat, &config.chat, chat_key)
        .map_err(|e| format!("failed to initialize chat client: {e}"))?;

    Ok(Advisor::new(
        fetcher,
        generator,
        store,
        AdvisorSettings::from_config(&config.advisor),
    ))
}

/// Build the full pipeline: embedder, store and advisor.
pub fn build_advisor(config: &Config) -> Result<DefaultAdvisor, String> {
    let embedder = build_embedder(config)?;
    let store = build_vector_store(config, embedder)?;
    build_advisor_with_store(config, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockEmbedder;

    fn temp_dir() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("crease-state-test-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn openai_embedder_from_inline_key() {
        let config = Config::parse(
            r#"
[models.embedding]
type = "openai"
model = "text-embedding-3-small"
api_key = "sk-test"
"#,
        )
        .unwrap();
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.dimensions(), 1536);
        assert_eq!(embedder.model_name(), "text-embedding-3-small");
        assert_eq!(embedder.provider_type(), "openai");
    }

    #[test]
    fn dimension_checked_even_without_parse() {
        // Configs built in code skip `Config::parse`.
        let mut config = Config::default();
        config.models.embedding.api_key = Some("sk-test".into());
        config.storage.dimension = 384;
        let err = build_embedder(&config).err().unwrap();
        assert!(err.contains("1536"), "got: {err}");
    }

    #[tokio::test]
    async fn vector_store_creates_parent_directories() {
        let dir = temp_dir();
        let mut config = Config::default();
        config.storage.database = dir.join("nested/store.db").to_string_lossy().into_owned();
        config.storage.dimension = 8;

        let store = build_vector_store(&config, Arc::new(MockEmbedder::new(8))).unwrap();
        assert_eq!(store.dimension(), 8);
        assert!(dir.join("nested").is_dir());

        drop(store);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn advisor_builds_with_inline_keys() {
        let dir = temp_dir();
        let mut config = Config::parse(
            r#"
[models.chat]
type = "openai"
model = "gpt-3.5-turbo"
api_key = "sk-test"

[search]
api_key = "exa-test"
"#,
        )
        .unwrap();
        config.storage.database = dir.join("store.db").to_string_lossy().into_owned();
        config.storage.dimension = 8;

        let store = build_vector_store(&config, Arc::new(MockEmbedder::new(8))).unwrap();
        let advisor = build_advisor_with_store(&config, store).unwrap();
        assert_eq!(advisor.store().get_stats().await.total_documents, 0);
        assert!(advisor.last_refresh().await.is_none());

        drop(advisor);
        std::fs::remove_dir_all(&dir).ok();
    }
}
