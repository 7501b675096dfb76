//! Structured-generation backends.
//!
//! The extraction client talks to the model through [`StructuredBackend`]
//! only. Two implementations ship with the crate:
//!
//! * [`gemini::GeminiBackend`] — calls `generateContent` with a native
//!   response schema, so the API itself constrains the output. This is the
//!   default.
//! * [`chat::ChatBackend`] — wraps any `edgequake-llm` chat provider. The
//!   schema travels in the prompt and the reply is parsed client-side.
//!
//! Tests substitute their own implementation to get deterministic output.

pub mod chat;
pub mod gemini;

use crate::error::ReviewError;
use crate::schema::ReviewTable;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything a backend needs for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    /// The composed prompt (template + header + document text).
    pub contents: String,
    pub response_schema: serde_json::Value,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub credential: String,
}

/// Token accounting reported by the API, when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub output_tokens: u64,
}

/// What came back from the API.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    /// Raw response text, kept for diagnostics.
    pub raw_text: String,
    /// The schema-parsed payload; `None` when the text did not parse.
    pub parsed: Option<ReviewTable>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// A structured-generation API.
///
/// Implementations return [`ReviewError::Transport`] for network, HTTP and
/// provider failures. A call the API accepted but whose payload did not
/// parse is NOT an error here: it comes back with `parsed: None` and the
/// client decides what that means.
#[async_trait]
pub trait StructuredBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest)
        -> Result<GenerationResponse, ReviewError>;
}

/// Convenience alias matching the type stored in [`crate::config::ReviewConfig`].
pub type SharedBackend = Arc<dyn StructuredBackend>;
