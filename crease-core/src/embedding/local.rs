use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::{EmbedError, EmbedFuture, Embedder};

const DEFAULT_MODEL: EmbeddingModel = EmbeddingModel::AllMiniLML6V2;
pub const LOCAL_DIMENSIONS: usize = 384;
const MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Local embedding provider using fastembed with ONNX runtime.
///
/// Inference is CPU-bound, so each batch runs on tokio's blocking pool.
pub struct LocalEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl LocalEmbedder {
    pub fn new() -> Result<Self, EmbedError> {
        let options = InitOptions::new(DEFAULT_MODEL).with_show_download_progress(true);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?;
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

impl Embedder for LocalEmbedder {
    fn embed<'a>(&'a self, texts: &'a [&'a str]) -> EmbedFuture<'a> {
        let model = Arc::clone(&self.model);
        let owned: Vec<String> = texts.iter().map(|t| (*t).to_string()).collect();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let mut model = model
                    .lock()
                    .map_err(|_| EmbedError::EncodingFailed("embedding model lock poisoned".into()))?;
                model
                    .embed(owned, None)
                    .map_err(|e| EmbedError::EncodingFailed(e.to_string()))
            })
            .await
            .map_err(|e| EmbedError::EncodingFailed(format!("embedding task failed: {e}")))?
        })
    }

    fn dimensions(&self) -> usize {
        LOCAL_DIMENSIONS
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn provider_type(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::*;

    /// Shared model instance across all tests to avoid parallel download races
    /// and redundant model loads.
    static EMBEDDER: LazyLock<LocalEmbedder> =
        LazyLock::new(|| LocalEmbedder::new().unwrap());

    fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    // These tests download the ONNX model on first use; run with
    // `cargo test -- --ignored` when network access is available.

    #[tokio::test]
    #[ignore]
    async fn embed_batch_returns_one_vector_per_text() {
        let result = EMBEDDER.embed(&["one", "two", "three"]).await.unwrap();
        assert_eq!(result.len(), 3);
        for vec in &result {
            assert_eq!(vec.len(), LOCAL_DIMENSIONS);
        }
    }

    #[tokio::test]
    #[ignore]
    async fn related_texts_are_closer_than_unrelated_ones() {
        let result = EMBEDDER
            .embed(&[
                "Kohli scored a century against Chennai",
                "Virat Kohli hit a hundred versus CSK",
                "quantum chromodynamics lecture notes",
            ])
            .await
            .unwrap();
        let near = squared_l2(&result[0], &result[1]);
        let far = squared_l2(&result[0], &result[2]);
        assert!(near < far, "expected related texts closer: {near} vs {far}");
    }
}
