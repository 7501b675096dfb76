//! Chat-provider backend for models without native schema support.
//!
//! Any `edgequake-llm` provider (OpenAI, Anthropic, Ollama, …) can run a
//! review. The response schema is sent as a system instruction and the
//! reply is parsed client-side. Providers authenticate from their own
//! environment variables (`OPENAI_API_KEY`, …); the request credential is
//! validated by the extraction client but not forwarded.

use super::{GenerationRequest, GenerationResponse, StructuredBackend, TokenUsage};
use crate::error::ReviewError;
use crate::prompts::json_only_instruction;
use crate::schema::ReviewTable;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// A whole reply wrapped in a ```json … ``` fence.
static FENCED_REPLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```(?:json|JSON)?\s*\n(.*?)\n?\s*```\s*$").expect("valid regex")
});

/// Runs reviews through an `edgequake-llm` chat provider.
pub struct ChatBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ChatBackend {
    /// Wrap an already-configured provider.
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            label: "chat".to_string(),
        }
    }

    /// Build a provider by name (`"openai"`, `"anthropic"`, …) for `model`.
    pub fn from_provider_name(name: &str, model: &str) -> Result<Self, ReviewError> {
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            ReviewError::InvalidConfig(format!("LLM provider '{name}' is not configured: {e}"))
        })?;
        Ok(Self {
            provider,
            label: name.to_string(),
        })
    }
}

#[async_trait]
impl StructuredBackend for ChatBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ReviewError> {
        let messages = vec![
            ChatMessage::system(json_only_instruction(&request.response_schema)),
            ChatMessage::user(request.contents.as_str()),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_output_tokens as usize),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(ReviewError::transport)?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        let parsed = parse_reply(&response.content);
        Ok(GenerationResponse {
            parsed,
            finish_reason: None,
            usage: Some(TokenUsage {
                prompt_tokens: response.prompt_tokens as u64,
                output_tokens: response.completion_tokens as u64,
            }),
            raw_text: response.content,
        })
    }
}

/// Strip a surrounding code fence, if any.
pub fn strip_json_fence(reply: &str) -> &str {
    match FENCED_REPLY.captures(reply).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => reply.trim(),
    }
}

fn parse_reply(reply: &str) -> Option<ReviewTable> {
    let body = strip_json_fence(reply);
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<ReviewTable>(body) {
        Ok(table) => Some(table),
        Err(e) => {
            warn!("Chat reply did not match the review schema: {}", e);
            None
        }
    }
}
