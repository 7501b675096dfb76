//! Debug artifacts written alongside an extraction.
//!
//! When a run produces a suspicious table, the first question is always
//! "what exactly did the model see, and what did it send back?". A
//! [`DirectorySink`] answers it by keeping the normalized document text, the
//! full request, the raw response and the parsed result, all stamped with
//! the same timestamp. Writing them is best-effort: [`record_or_warn`]
//! downgrades every failure to a `warn!`.

use crate::backend::GenerationResponse;
use crate::schema::ReviewTable;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

/// One artifact produced during an extraction.
pub enum DiagnosticArtifact<'a> {
    /// Concatenated document text with provenance banners.
    NormalizedText(&'a str),
    /// The complete request payload.
    Request(&'a str),
    /// The raw API response.
    RawResponse {
        model: &'a str,
        response: &'a GenerationResponse,
    },
    /// The parsed table.
    ParsedResult(&'a ReviewTable),
}

/// Destination for [`DiagnosticArtifact`]s.
///
/// A fresh run id is requested at the start of every extraction so the
/// artifacts of one attempt can be told apart from the next.
pub trait DiagnosticsSink: Send + Sync {
    fn begin_run(&self) -> String;

    fn record(&self, run_id: &str, artifact: &DiagnosticArtifact<'_>) -> io::Result<()>;
}

/// Discards everything.
pub struct NoopSink;

impl DiagnosticsSink for NoopSink {
    fn begin_run(&self) -> String {
        String::new()
    }

    fn record(&self, _run_id: &str, _artifact: &DiagnosticArtifact<'_>) -> io::Result<()> {
        Ok(())
    }
}

/// Writes artifacts as files in a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, run_id: &str, artifact: &DiagnosticArtifact<'_>) -> PathBuf {
        let name = match artifact {
            DiagnosticArtifact::NormalizedText(_) => format!("pdf_markdown_{run_id}.md"),
            DiagnosticArtifact::Request(_) => format!("full_prompt_{run_id}.txt"),
            DiagnosticArtifact::RawResponse { .. } => format!("api_response_raw_{run_id}.txt"),
            DiagnosticArtifact::ParsedResult(_) => format!("parsed_result_{run_id}.json"),
        };
        self.dir.join(name)
    }
}

impl DiagnosticsSink for DirectorySink {
    fn begin_run(&self) -> String {
        chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
    }

    fn record(&self, run_id: &str, artifact: &DiagnosticArtifact<'_>) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.file_for(run_id, artifact);
        let body = match artifact {
            DiagnosticArtifact::NormalizedText(text) | DiagnosticArtifact::Request(text) => {
                (*text).to_string()
            }
            DiagnosticArtifact::RawResponse { model, response } => {
                render_raw_response(model, response)
            }
            DiagnosticArtifact::ParsedResult(table) => serde_json::to_string_pretty(table)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
        };
        std::fs::write(&path, body)?;
        info!("Saved diagnostics to: {}", path.display());
        Ok(())
    }
}

fn render_raw_response(model: &str, response: &GenerationResponse) -> String {
    let mut out = format!("Model: {model}\n");
    out.push_str(&format!(
        "Finish reason: {}\n",
        response.finish_reason.as_deref().unwrap_or("N/A")
    ));
    if let Some(usage) = &response.usage {
        out.push_str(&format!(
            "Usage: {} prompt tokens, {} output tokens\n",
            usage.prompt_tokens, usage.output_tokens
        ));
    }
    out.push_str(&format!("Parsed: {}\n", response.parsed.is_some()));
    out.push_str("Response text:\n");
    out.push_str(&response.raw_text);
    out.push('\n');
    out
}

/// Record an artifact, logging instead of failing when the sink errors.
pub fn record_or_warn(sink: &dyn DiagnosticsSink, run_id: &str, artifact: DiagnosticArtifact<'_>) {
    if let Err(e) = sink.record(run_id, &artifact) {
        warn!("Could not save diagnostics: {}", e);
    }
}
