use reqwest::Client;
use serde::Deserialize;

use crate::config::{ChatConfig, ProviderEntry};
use crate::embedding::openai::DEFAULT_ENDPOINT;
use crate::provider::{ProviderError, build_client, endpoint_url, map_error_status};

use super::{Generation, ResponseGenerator, TokenUsage};

/// OpenAI-compatible chat client (works with OpenAI, Azure OpenAI, and any
/// endpoint that speaks the same chat-completions protocol).
pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiGenerator {
    pub fn new(entry: &ProviderEntry, chat: &ChatConfig, api_key: String) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(entry.timeout())?,
            api_key,
            model: entry.model.clone(),
            endpoint: entry
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            system_prompt: chat.system_prompt.clone(),
            temperature: chat.temperature,
            max_tokens: chat.max_tokens,
        })
    }
}

/// The user turn: the question followed by everything retrieved for it.
fn user_prompt(query: &str, context: &str) -> String {
    format!(
        "Based on the following information, please answer this question about Fantasy IPL Cricket: {query}\n\nContext:\n{context}"
    )
}

/// Build the full request body for the chat completions endpoint.
fn build_request_body(
    query: &str,
    context: &str,
    model: &str,
    system_prompt: &str,
    temperature: f32,
    max_tokens: u32,
) -> serde_json::Value {
    let mut messages = Vec::new();
    if !system_prompt.is_empty() {
        messages.push(serde_json::json!({
            "role": "system",
            "content": system_prompt,
        }));
    }
    messages.push(serde_json::json!({
        "role": "user",
        "content": user_prompt(query, context),
    }));

    serde_json::json!({
        "model": model,
        "messages": messages,
        "temperature": temperature,
        "max_tokens": max_tokens,
    })
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn parse_completion(body: &str) -> Result<(String, Option<TokenUsage>), ProviderError> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid completion JSON: {e}")))?;
    let text = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("completion has no choices".into()))?
        .message
        .content
        .unwrap_or_default();
    Ok((text, completion.usage))
}

impl ResponseGenerator for OpenAiGenerator {
    async fn generate(&self, query: &str, context: &str) -> Result<Generation, ProviderError> {
        let url = endpoint_url(&self.endpoint, "chat/completions");
        let body = build_request_body(
            query,
            context,
            &self.model,
            &self.system_prompt,
            self.temperature,
            self.max_tokens,
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(map_error_status(status.as_u16(), &text));
        }

        let (response_text, usage) = parse_completion(&text)?;
        if let Some(usage) = usage {
            log::debug!(
                "completion used {} prompt + {} completion tokens",
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }
        Ok(Generation::new(&self.model, response_text, usage))
    }
}
