//! Native Gemini backend over the `generateContent` REST endpoint.
//!
//! Gemini accepts a `responseSchema` next to `responseMimeType:
//! application/json`, which constrains decoding server-side. That is the
//! strongest guarantee available that every row carries all eight fields,
//! so this backend is the default.

use super::{GenerationRequest, GenerationResponse, StructuredBackend, TokenUsage};
use crate::error::ReviewError;
use crate::schema::ReviewTable;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Public API root.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Calls `POST {endpoint}/models/{model}:generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    http: reqwest::Client,
    endpoint: String,
}

impl Default for GeminiBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiBackend {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Point at a different API root (proxy, regional endpoint, test server).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model)
    }
}

#[async_trait]
impl StructuredBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ReviewError> {
        let body = build_body(request);
        let url = self.url_for(&request.model);
        debug!("POST {} ({} prompt chars)", url, request.contents.len());

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &request.credential)
            .json(&body)
            .send()
            .await
            .map_err(ReviewError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ReviewError::Transport {
                message: format!("HTTP {status}: {}", detail.trim()),
            });
        }

        let payload: GenerateContentResponse =
            response.json().await.map_err(ReviewError::transport)?;
        Ok(interpret_response(payload))
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a serde_json::Value,
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

fn build_body(request: &GenerationRequest) -> GenerateContentRequest<'_> {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![TextPart {
                text: &request.contents,
            }],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: &request.response_schema,
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        },
    }
}

fn interpret_response(payload: GenerateContentResponse) -> GenerationResponse {
    let first = payload.candidates.into_iter().next();
    let finish_reason = first.as_ref().and_then(|c| c.finish_reason.clone());
    let raw_text: String = first
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if let Some(reason) = finish_reason.as_deref() {
        if reason != "STOP" {
            warn!("Gemini finished with reason {reason}; output may be truncated");
        }
    }

    let parsed = if raw_text.trim().is_empty() {
        None
    } else {
        match serde_json::from_str::<ReviewTable>(&raw_text) {
            Ok(table) => Some(table),
            Err(e) => {
                warn!("Response did not match the review schema: {}", e);
                None
            }
        }
    };

    GenerationResponse {
        raw_text,
        parsed,
        finish_reason,
        usage: payload.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "gemini-2.5-pro".into(),
            contents: "TEMPLATE\n\nDOCS".into(),
            response_schema: crate::schema::review_table_schema(),
            temperature: 0.0,
            max_output_tokens: 65_536,
            credential: "AIzaSyExample-123456".into(),
        }
    }

    #[test]
    fn body_uses_camel_case_generation_config() {
        let req = request();
        let json = serde_json::to_value(build_body(&req)).unwrap();
        let cfg = &json["generationConfig"];
        assert_eq!(cfg["responseMimeType"], "application/json");
        assert_eq!(cfg["temperature"], 0.0);
        assert_eq!(cfg["maxOutputTokens"], 65_536);
        assert_eq!(cfg["responseSchema"]["type"], "OBJECT");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "TEMPLATE\n\nDOCS");
    }

    #[test]
    fn url_includes_model_and_trims_slash() {
        let b = GeminiBackend::with_endpoint("http://localhost:9999/v1beta/");
        assert_eq!(
            b.url_for("gemini-2.5-flash"),
            "http://localhost:9999/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn response_parts_are_joined_and_parsed() {
        let payload: GenerateContentResponse = serde_json::from_str(
            r#"{
              "candidates": [{
                "content": {"parts": [
                  {"text": "{\"rows\":[{\"requirement_no\":\"REQ-1\",\"requirement_content\":\"foo\","},
                  {"text": "\"evaluation\":\"〇\",\"compliance_location\":\"3.2\",\"compliance_reason\":\"ok\",\"correction_plan\":\"\",\"response_status\":\"\",\"response_method\":\"\"}]}"}
                ]},
                "finishReason": "STOP"
              }],
              "usageMetadata": {"promptTokenCount": 1200, "candidatesTokenCount": 80}
            }"#,
        )
        .unwrap();

        let resp = interpret_response(payload);
        let table = resp.parsed.expect("parsed");
        assert_eq!(table.rows[0].requirement_no, "REQ-1");
        assert_eq!(resp.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(
            resp.usage,
            Some(TokenUsage {
                prompt_tokens: 1200,
                output_tokens: 80
            })
        );
    }

    #[test]
    fn truncated_json_yields_no_parsed_payload() {
        let payload: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"rows\":[{\"requirement_no\":"}]},
                "finishReason":"MAX_TOKENS"}]}"#,
        )
        .unwrap();
        let resp = interpret_response(payload);
        assert!(resp.parsed.is_none());
        assert!(!resp.raw_text.is_empty());
    }

    #[test]
    fn no_candidates_is_empty() {
        let resp = interpret_response(GenerateContentResponse::default());
        assert!(resp.parsed.is_none());
        assert!(resp.raw_text.is_empty());
        assert!(resp.usage.is_none());
    }
}
