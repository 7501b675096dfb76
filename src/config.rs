//! Configuration types for a review run.
//!
//! Every knob lives in [`ReviewConfig`], built via [`ReviewConfigBuilder`].
//! Collaborators (backend, document converter, observer, diagnostics sink)
//! are injected here too, so tests and embedding applications can swap any
//! of them without touching the pipeline.

use crate::backend::SharedBackend;
use crate::diagnostics::DiagnosticsSink;
use crate::error::ReviewError;
use crate::observer::SharedObserver;
use crate::pipeline::normalize::{PdfiumConverter, SharedConverter};
use crate::pipeline::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default model for the native Gemini backend.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Configuration for a review run.
///
/// # Example
/// ```rust
/// use edgequake_docreview::ReviewConfig;
///
/// let config = ReviewConfig::builder()
///     .model("gemini-2.5-flash")
///     .api_key("AIzaSy...")
///     .max_attempts(5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReviewConfig {
    /// Model identifier. Default: `gemini-2.5-pro`.
    pub model: String,

    /// API key sent with every request. Required at run time; a missing,
    /// empty or placeholder key fails each attempt with
    /// [`ReviewError::InvalidCredential`].
    pub api_key: Option<String>,

    /// Review instructions. If None, uses [`crate::prompts::DEFAULT_REVIEW_PROMPT`].
    pub prompt_template: Option<String>,

    /// Total attempts, including the first. Default: 3.
    pub max_attempts: u32,

    /// Wait before the first retry, in milliseconds; doubles after each
    /// further failure. Default: 3000 (3 s → 6 s → 12 s).
    pub retry_base_delay_ms: u64,

    /// Output-token ceiling per request. Default: 65 536.
    ///
    /// A 150-row review table runs to roughly 30 000 tokens. A ceiling that
    /// is too low truncates the JSON mid-row, which shows up as
    /// [`ReviewError::EmptyResult`].
    pub max_output_tokens: u32,

    /// Which filename markers identify the previous and current design versions.
    pub version_markers: VersionMarkers,

    /// Directory for debug artifacts. None disables them (unless a
    /// `diagnostics` sink is injected).
    pub diagnostics_dir: Option<PathBuf>,

    /// Chat provider name (`openai`, `anthropic`, `ollama`, …). None uses
    /// the native Gemini backend.
    pub provider_name: Option<String>,

    /// Pre-constructed backend. Takes precedence over `provider_name`.
    pub backend: Option<SharedBackend>,

    /// User password for encrypted PDFs, passed to the default pdfium
    /// converter. Ignored when `converter` is injected.
    pub password: Option<String>,

    /// Pre-constructed converter for non-textual documents. Default: pdfium.
    pub converter: Option<SharedConverter>,

    /// Receives attempt and retry events.
    pub observer: Option<SharedObserver>,

    /// Pre-constructed diagnostics sink. Takes precedence over `diagnostics_dir`.
    pub diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            prompt_template: None,
            max_attempts: 3,
            retry_base_delay_ms: 3000,
            max_output_tokens: crate::pipeline::extract::DEFAULT_MAX_OUTPUT_TOKENS,
            version_markers: VersionMarkers::default(),
            diagnostics_dir: None,
            provider_name: None,
            backend: None,
            password: None,
            converter: None,
            observer: None,
            diagnostics: None,
        }
    }
}

impl fmt::Debug for ReviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("prompt_template", &self.prompt_template.as_ref().map(|p| p.len()))
            .field("max_attempts", &self.max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("version_markers", &self.version_markers)
            .field("diagnostics_dir", &self.diagnostics_dir)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("converter", &self.converter.as_ref().map(|_| "<dyn DocumentConverter>"))
            .field("observer", &self.observer.as_ref().map(|_| "<dyn ReviewObserver>"))
            .field("diagnostics", &self.diagnostics.as_ref().map(|_| "<dyn DiagnosticsSink>"))
            .finish()
    }
}

impl ReviewConfig {
    /// Create a new builder for `ReviewConfig`.
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder {
            config: Self::default(),
        }
    }

    /// The pdfium converter used when no converter is injected.
    pub fn pdfium_converter(&self) -> PdfiumConverter {
        match self.password {
            Some(ref password) => PdfiumConverter::with_password(password.clone()),
            None => PdfiumConverter::new(),
        }
    }

    /// The converter for non-textual documents: the injected one, else pdfium.
    pub fn document_converter(&self) -> SharedConverter {
        match self.converter {
            Some(ref converter) => Arc::clone(converter),
            None => Arc::new(self.pdfium_converter()),
        }
    }

    /// The retry policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

/// Builder for [`ReviewConfig`].
#[derive(Debug)]
pub struct ReviewConfigBuilder {
    config: ReviewConfig,
}

impl ReviewConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_base_delay_ms = ms;
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn version_markers(mut self, markers: VersionMarkers) -> Self {
        self.config.version_markers = markers;
        self
    }

    pub fn diagnostics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.diagnostics_dir = Some(dir.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: SharedBackend) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    pub fn converter(mut self, converter: SharedConverter) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.config.observer = Some(observer);
        self
    }

    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.config.diagnostics = Some(sink);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReviewConfig, ReviewError> {
        let c = &self.config;
        if c.max_attempts == 0 {
            return Err(ReviewError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.max_output_tokens == 0 {
            return Err(ReviewError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(ReviewError::InvalidConfig("model must not be empty".into()));
        }
        Ok(self.config)
    }
}

/// Version numbers recognised in document filenames.
///
/// Workbook sheets are exported as `{book}_{sheet}_V{n}.pdf`, so a reviewer
/// comparing two rounds has files carrying `V6` and `V7`. Banners then tell
/// the model which one is which.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarkers {
    /// The design version reviewed last round.
    pub previous: u32,
    /// The design version under review now.
    pub current: u32,
}

impl Default for VersionMarkers {
    fn default() -> Self {
        Self {
            previous: 6,
            current: 7,
        }
    }
}
