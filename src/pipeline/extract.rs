//! Extraction client: one request to the structured-generation API.
//!
//! The client holds no state between calls. Each call validates the
//! credential, composes `template + header + documents`, asks the backend
//! for output constrained to the review schema with temperature pinned to
//! zero, and hands back the parsed table untouched. Whether the table is
//! complete is up to the prompt and the model; nothing here checks it.

use crate::backend::{GenerationRequest, SharedBackend};
use crate::config::VersionMarkers;
use crate::credential;
use crate::diagnostics::{record_or_warn, DiagnosticArtifact, DiagnosticsSink, NoopSink};
use crate::error::ReviewError;
use crate::pipeline::normalize::{self, PdfiumConverter, SharedConverter};
use crate::prompts::compose_request;
use crate::schema::{review_table_schema, ReviewTable};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Sampling temperature for every extraction.
pub const EXTRACTION_TEMPERATURE: f32 = 0.0;

/// Output ceiling large enough for tables with hundreds of rows.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 65_536;

/// Calls a [`crate::backend::StructuredBackend`] once per extraction.
#[derive(Clone)]
pub struct ExtractionClient {
    backend: SharedBackend,
    converter: SharedConverter,
    diagnostics: Arc<dyn DiagnosticsSink>,
    markers: VersionMarkers,
    max_output_tokens: u32,
}

impl ExtractionClient {
    /// A client with the pdfium converter, no diagnostics and default limits.
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            backend,
            converter: Arc::new(PdfiumConverter::new()),
            diagnostics: Arc::new(NoopSink),
            markers: VersionMarkers::default(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_converter(mut self, converter: SharedConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn with_version_markers(mut self, markers: VersionMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_max_output_tokens(mut self, n: u32) -> Self {
        self.max_output_tokens = n;
        self
    }

    /// Normalize `paths` and extract a review table from them.
    ///
    /// Checks the credential, then that every path exists, before doing any
    /// conversion work.
    pub async fn extract_documents(
        &self,
        paths: &[PathBuf],
        prompt_template: &str,
        credential: &str,
        model: &str,
    ) -> Result<ReviewTable, ReviewError> {
        credential::check(credential)?;
        normalize::ensure_exist(paths)?;

        info!("Starting AI review with {} files", paths.len());
        info!("Using model: {}", model);

        let text = self.normalize_blocking(paths.to_vec()).await?;
        self.extract(&text, prompt_template, credential, model).await
    }

    /// Extract a review table from already-normalized text.
    pub async fn extract(
        &self,
        text: &str,
        prompt_template: &str,
        credential: &str,
        model: &str,
    ) -> Result<ReviewTable, ReviewError> {
        credential::check(credential)?;

        let run_id = self.diagnostics.begin_run();
        let sink = self.diagnostics.as_ref();
        record_or_warn(sink, &run_id, DiagnosticArtifact::NormalizedText(text));

        let contents = compose_request(prompt_template, text);
        record_or_warn(sink, &run_id, DiagnosticArtifact::Request(&contents));

        let request = GenerationRequest {
            model: model.to_string(),
            contents,
            response_schema: review_table_schema(),
            temperature: EXTRACTION_TEMPERATURE,
            max_output_tokens: self.max_output_tokens,
            credential: credential.to_string(),
        };

        info!("Calling {} API for review...", self.backend.name());
        let response = self.backend.generate(&request).await?;
        record_or_warn(
            sink,
            &run_id,
            DiagnosticArtifact::RawResponse {
                model,
                response: &response,
            },
        );

        let Some(table) = response.parsed else {
            error!("Failed to parse API response");
            return Err(ReviewError::EmptyResult {
                model: model.to_string(),
            });
        };

        record_or_warn(sink, &run_id, DiagnosticArtifact::ParsedResult(&table));
        info!("AI review completed. Extracted {} rows", table.len());
        Ok(table)
    }

    async fn normalize_blocking(&self, paths: Vec<PathBuf>) -> Result<String, ReviewError> {
        let converter = Arc::clone(&self.converter);
        let markers = self.markers.clone();
        tokio::task::spawn_blocking(move || {
            normalize::normalize(&paths, converter.as_ref(), &markers)
        })
        .await
        .map_err(|e| ReviewError::Internal(format!("Normalization task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GenerationResponse, StructuredBackend};
    use crate::schema::ReviewRow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers every request with a fixed outcome and keeps the last request.
    struct StubBackend {
        outcome: fn() -> Result<GenerationResponse, ReviewError>,
        last: Mutex<Option<GenerationRequest>>,
    }

    impl StubBackend {
        fn new(outcome: fn() -> Result<GenerationResponse, ReviewError>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl StructuredBackend for StubBackend {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationResponse, ReviewError> {
            *self.last.lock().unwrap() = Some(request.clone());
            (self.outcome)()
        }
    }

    fn one_row() -> Result<GenerationResponse, ReviewError> {
        let table = ReviewTable {
            rows: vec![ReviewRow {
                requirement_no: "REQ-1".into(),
                requirement_content: "foo".into(),
                evaluation: "〇".into(),
                compliance_location: "3.2".into(),
                compliance_reason: "ok".into(),
                correction_plan: String::new(),
                response_status: String::new(),
                response_method: String::new(),
            }],
        };
        Ok(GenerationResponse {
            raw_text: serde_json::to_string(&table).unwrap(),
            parsed: Some(table),
            finish_reason: Some("STOP".into()),
            usage: None,
        })
    }

    fn unparsed() -> Result<GenerationResponse, ReviewError> {
        Ok(GenerationResponse {
            raw_text: "not json".into(),
            parsed: None,
            finish_reason: Some("STOP".into()),
            usage: None,
        })
    }

    fn http_503() -> Result<GenerationResponse, ReviewError> {
        Err(ReviewError::transport("HTTP 503 Service Unavailable"))
    }

    const KEY: &str = "AIzaSyExample-123456";

    #[tokio::test]
    async fn rejects_empty_and_placeholder_credentials() {
        let stub = StubBackend::new(one_row);
        let client = ExtractionClient::new(stub.clone());
        for key in ["", "YOUR_API_KEY_HERE", "YOUR_GEMINI_API_KEY_HERE"] {
            let err = client.extract("text", "tpl", key, "m").await.unwrap_err();
            assert!(matches!(err, ReviewError::InvalidCredential), "{key:?}");
        }
        assert!(stub.last.lock().unwrap().is_none(), "API must not be called");
    }

    #[tokio::test]
    async fn request_is_composed_with_temperature_zero() {
        let stub = StubBackend::new(one_row);
        let client = ExtractionClient::new(stub.clone()).with_max_output_tokens(32_000);
        let table = client
            .extract("DOC TEXT", "REVIEW TEMPLATE", KEY, "gemini-2.5-pro")
            .await
            .unwrap();
        assert_eq!(table.rows[0].requirement_no, "REQ-1");

        let req = stub.last.lock().unwrap().clone().unwrap();
        assert_eq!(req.temperature, 0.0);
        assert_eq!(req.max_output_tokens, 32_000);
        assert_eq!(req.model, "gemini-2.5-pro");
        assert_eq!(req.credential, KEY);
        assert!(req.contents.starts_with("REVIEW TEMPLATE"));
        assert!(req.contents.contains(crate::prompts::CONTENT_SECTION_HEADER));
        assert!(req.contents.trim_end().ends_with("DOC TEXT"));
    }

    #[tokio::test]
    async fn repeated_calls_are_identical() {
        let client = ExtractionClient::new(StubBackend::new(one_row));
        let a = client.extract("t", "p", KEY, "m").await.unwrap();
        let b = client.extract("t", "p", KEY, "m").await.unwrap();
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[tokio::test]
    async fn unparsed_payload_is_empty_result() {
        let client = ExtractionClient::new(StubBackend::new(unparsed));
        let err = client.extract("t", "p", KEY, "m").await.unwrap_err();
        assert!(matches!(err, ReviewError::EmptyResult { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn transport_errors_pass_through() {
        let client = ExtractionClient::new(StubBackend::new(http_503));
        let err = client.extract("t", "p", KEY, "m").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn diagnostics_failure_does_not_fail_extraction() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let client = ExtractionClient::new(StubBackend::new(one_row)).with_diagnostics(Arc::new(
            crate::diagnostics::DirectorySink::new(&blocker),
        ));
        let table = client.extract("t", "p", KEY, "m").await.unwrap();
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn missing_document_is_checked_before_conversion() {
        let stub = StubBackend::new(one_row);
        let client = ExtractionClient::new(stub.clone());
        let err = client
            .extract_documents(&[PathBuf::from("/no/such/spec.pdf")], "p", KEY, "m")
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::NotFound { .. }), "got {err:?}");
        assert!(stub.last.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn credential_is_checked_before_paths() {
        let client = ExtractionClient::new(StubBackend::new(one_row));
        let err = client
            .extract_documents(&[PathBuf::from("/no/such/spec.pdf")], "p", "", "m")
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidCredential));
    }
}
