pub mod indicators;
pub mod openai;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderError;

pub use indicators::{ConfidenceIndicators, ConfidenceLevel, PhraseCounts};

/// Token accounting reported by the model endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A generated answer plus what the model endpoint reported about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub response_text: String,
    pub confidence_indicators: ConfidenceIndicators,
    pub token_usage: Option<TokenUsage>,
    pub model: String,
}

impl Generation {
    pub fn new(model: &str, response_text: String, token_usage: Option<TokenUsage>) -> Self {
        let confidence_indicators = ConfidenceIndicators::extract(&response_text);
        Self {
            response_text,
            confidence_indicators,
            token_usage,
            model: model.to_string(),
        }
    }
}

/// Trait abstracting answer generation from a query and its fused context.
pub trait ResponseGenerator: Send + Sync {
    fn generate(
        &self,
        query: &str,
        context: &str,
    ) -> impl Future<Output = Result<Generation, ProviderError>> + Send;
}
