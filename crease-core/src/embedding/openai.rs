use reqwest::Client;
use serde::Deserialize;

use crate::config::ProviderEntry;
use crate::provider::{ProviderError, build_client, endpoint_url, map_error_status};

use super::{EmbedError, EmbedFuture, Embedder};

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// Known output widths for OpenAI embedding models.
pub fn known_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-ada-002" | "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// OpenAI-compatible embeddings client (`POST {endpoint}/embeddings`).
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(entry: &ProviderEntry, api_key: String, dimensions: usize) -> Result<Self, EmbedError> {
        let client = build_client(entry.timeout())?;
        Ok(Self {
            client,
            api_key,
            model: entry.model.clone(),
            endpoint: entry
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            dimensions,
        })
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = endpoint_url(&self.endpoint, "embeddings");
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_error_status(status.as_u16(), &body_text).into());
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        parse_embeddings(&text, texts.len())
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Parse an embeddings response, restoring input order by `index`.
fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>, EmbedError> {
    let mut parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid embeddings JSON: {e}")))?;
    if parsed.data.len() != expected {
        return Err(EmbedError::EncodingFailed(format!(
            "expected {expected} embeddings, got {}",
            parsed.data.len()
        )));
    }
    parsed.data.sort_by_key(|d| d.index);
    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}

impl Embedder for OpenAiEmbedder {
    fn embed<'a>(&'a self, texts: &'a [&'a str]) -> EmbedFuture<'a> {
        Box::pin(self.request(texts))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_type(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_embeddings_restores_input_order() {
        let body = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
            ],
            "model": "text-embedding-ada-002"
        }"#;
        let vectors = parse_embeddings(body, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn parse_embeddings_rejects_count_mismatch() {
        let body = r#"{"data": [{"index": 0, "embedding": [1.0]}]}"#;
        let err = parse_embeddings(body, 2).unwrap_err();
        assert!(matches!(err, EmbedError::EncodingFailed(_)), "got {err:?}");
    }

    #[test]
    fn parse_embeddings_rejects_garbage() {
        let err = parse_embeddings("not json", 1).unwrap_err();
        assert!(
            matches!(err, EmbedError::Provider(ProviderError::MalformedResponse(_))),
            "got {err:?}"
        );
    }

    #[test]
    fn known_dimensions_for_ada() {
        assert_eq!(known_dimensions("text-embedding-ada-002"), Some(1536));
        assert_eq!(known_dimensions("my-custom-model"), None);
    }
}
