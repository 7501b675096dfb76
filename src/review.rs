//! Top-level review entry points.
//!
//! [`review`] wires the collaborators named in a [`ReviewConfig`] into an
//! [`ExtractionClient`], wraps it in a [`ReviewOrchestrator`] and runs it
//! once. Everything not injected falls back to a sensible default: the
//! native Gemini backend, the pdfium converter, no observer, and a
//! diagnostics directory only when one is configured.

use crate::backend::chat::ChatBackend;
use crate::backend::gemini::GeminiBackend;
use crate::backend::SharedBackend;
use crate::config::ReviewConfig;
use crate::diagnostics::{DiagnosticsSink, DirectorySink, NoopSink};
use crate::error::ReviewError;
use crate::observer::{NoopObserver, SharedObserver};
use crate::output::{save_results, OutputFormat, ReviewOutput, ReviewStats};
use crate::pipeline::extract::ExtractionClient;
use crate::pipeline::retry::ReviewOrchestrator;
use crate::prompts::DEFAULT_REVIEW_PROMPT;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Environment variable consulted when [`ReviewConfig::api_key`] is unset.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Prefix of the stand-in credential used for chat providers, which read
/// their own key from the environment.
const PROVIDER_CREDENTIAL_PREFIX: &str = "provider-env:";

/// Review a set of design documents and return the extracted table.
///
/// Documents are reviewed together in the order given; banners in the
/// request tell the model which file each section came from.
///
/// # Errors
/// Returns the error of the last attempt once every attempt has failed.
/// An empty document list is rejected up front with
/// [`ReviewError::InvalidConfig`].
///
/// # Example
/// ```rust,no_run
/// use edgequake_docreview::{review, ReviewConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ReviewConfig::builder().api_key("AIzaSy...").build()?;
/// let output = review(["requirements_V7.pdf", "design_V7.md"], &config).await?;
/// for row in &output.table.rows {
///     println!("{} {}", row.requirement_no, row.evaluation);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn review<I, P>(paths: I, config: &ReviewConfig) -> Result<ReviewOutput, ReviewError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let start = Instant::now();
    let paths: Vec<PathBuf> = paths
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .collect();
    if paths.is_empty() {
        return Err(ReviewError::InvalidConfig("no input documents given".into()));
    }
    info!("Reviewing {} documents with {}", paths.len(), config.model);

    // ── Collaborators ────────────────────────────────────────────────────
    let backend = resolve_backend(config)?;
    let client = ExtractionClient::new(backend)
        .with_converter(config.document_converter())
        .with_diagnostics(resolve_diagnostics(config))
        .with_version_markers(config.version_markers.clone())
        .with_max_output_tokens(config.max_output_tokens);
    let observer: SharedObserver = config
        .observer
        .clone()
        .unwrap_or_else(|| Arc::new(NoopObserver));

    // ── Run ──────────────────────────────────────────────────────────────
    let template = config
        .prompt_template
        .as_deref()
        .unwrap_or(DEFAULT_REVIEW_PROMPT);
    let credential = resolve_credential(config);

    let table = ReviewOrchestrator::new(client, config.retry_policy())
        .with_observer(observer)
        .run(&paths, template, &credential, &config.model)
        .await?;

    let stats = ReviewStats {
        documents: paths.len(),
        rows: table.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Review complete: {} rows from {} documents in {}ms",
        stats.rows, stats.documents, stats.duration_ms
    );

    Ok(ReviewOutput { table, stats })
}

/// Synchronous wrapper around [`review`].
///
/// Creates a temporary tokio runtime internally.
pub fn review_sync<I, P>(paths: I, config: &ReviewConfig) -> Result<ReviewOutput, ReviewError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    tokio::runtime::Runtime::new()
        .map_err(|e| ReviewError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(review(paths, config))
}

/// Review documents and save the table as round `round` in `output_dir`.
///
/// Returns the path of the written file. An empty table is an error
/// ([`ReviewError::EmptyTable`]) and nothing is written.
pub async fn review_to_file<I, P>(
    paths: I,
    output_dir: impl AsRef<Path>,
    round: u32,
    format: OutputFormat,
    config: &ReviewConfig,
) -> Result<(ReviewOutput, PathBuf), ReviewError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let output = review(paths, config).await?;
    let dir = output_dir.as_ref().to_path_buf();
    let table = output.table.clone();
    let path = tokio::task::spawn_blocking(move || save_results(&table, &dir, round, format))
        .await
        .map_err(|e| ReviewError::Internal(format!("Output task panicked: {e}")))??;
    Ok((output, path))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Pick the backend, from most to least specific.
///
/// 1. A pre-built backend (`config.backend`), used as-is.
/// 2. A named chat provider (`config.provider_name`), built through the
///    `edgequake-llm` factory for `config.model`.
/// 3. The native Gemini backend.
fn resolve_backend(config: &ReviewConfig) -> Result<SharedBackend, ReviewError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }
    if let Some(ref name) = config.provider_name {
        debug!("Using chat provider '{}'", name);
        return Ok(Arc::new(ChatBackend::from_provider_name(name, &config.model)?));
    }
    Ok(Arc::new(GeminiBackend::new()))
}

fn resolve_diagnostics(config: &ReviewConfig) -> Arc<dyn DiagnosticsSink> {
    if let Some(ref sink) = config.diagnostics {
        return Arc::clone(sink);
    }
    match config.diagnostics_dir {
        Some(ref dir) => Arc::new(DirectorySink::new(dir)),
        None => Arc::new(NoopSink),
    }
}

/// The configured key, else `GEMINI_API_KEY`.
///
/// Chat providers authenticate from their own environment variables, so
/// without either key a chat run uses the provider's name as the request
/// credential. A native run without a key gets an empty string, which the
/// extraction client rejects on every attempt.
fn resolve_credential(config: &ReviewConfig) -> String {
    if let Some(key) = config
        .api_key
        .clone()
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .filter(|k| !k.is_empty())
    {
        return key;
    }
    match (&config.backend, &config.provider_name) {
        (None, Some(name)) => format!("{PROVIDER_CREDENTIAL_PREFIX}{name}"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_backend_wins_over_provider_name() {
        struct Named;
        #[async_trait::async_trait]
        impl crate::backend::StructuredBackend for Named {
            fn name(&self) -> &str {
                "injected"
            }
            async fn generate(
                &self,
                _request: &crate::backend::GenerationRequest,
            ) -> Result<crate::backend::GenerationResponse, ReviewError> {
                Err(ReviewError::transport("unused"))
            }
        }

        let config = ReviewConfig::builder()
            .provider_name("openai")
            .backend(Arc::new(Named))
            .build()
            .unwrap();
        assert_eq!(resolve_backend(&config).unwrap().name(), "injected");
    }

    #[test]
    fn default_backend_is_gemini() {
        let config = ReviewConfig::default();
        assert_eq!(resolve_backend(&config).unwrap().name(), "gemini");
    }

    #[test]
    fn configured_key_takes_precedence() {
        let config = ReviewConfig::builder()
            .api_key("AIzaSyConfigured")
            .build()
            .unwrap();
        assert_eq!(resolve_credential(&config), "AIzaSyConfigured");
    }

    #[test]
    fn chat_provider_without_key_gets_a_usable_credential() {
        if std::env::var(API_KEY_ENV).is_ok() {
            return;
        }
        let config = ReviewConfig::builder()
            .provider_name("openai")
            .build()
            .unwrap();
        let credential = resolve_credential(&config);
        assert_eq!(credential, "provider-env:openai");
        assert!(crate::credential::check(&credential).is_ok());
    }

    #[test]
    fn native_backend_without_key_is_rejected() {
        if std::env::var(API_KEY_ENV).is_ok() {
            return;
        }
        let credential = resolve_credential(&ReviewConfig::default());
        assert!(matches!(
            crate::credential::check(&credential),
            Err(ReviewError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn empty_document_list_is_rejected() {
        let config = ReviewConfig::default();
        let err = review(Vec::<PathBuf>::new(), &config).await.unwrap_err();
        assert!(matches!(err, ReviewError::InvalidConfig(_)));
    }
}
