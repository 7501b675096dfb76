//! Error types for the edgequake-docreview library.
//!
//! A single fatal type, [`ReviewError`], is returned from every stage. The
//! retry loop in [`crate::pipeline::retry`] never wraps or reclassifies what
//! the extraction client raises; it only decides whether to try again. That
//! decision can look at [`ReviewError::kind`], which is why the
//! classification lives here rather than in the loop.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by pluggable collaborators (document converters,
/// chat providers) whose concrete error types this crate does not know.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All fatal errors returned by the edgequake-docreview library.
#[derive(Debug, Error)]
pub enum ReviewError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// An input document does not exist.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    NotFound { path: PathBuf },

    /// A textual input (Markdown) is not valid UTF-8.
    #[error("File '{path}' is not valid UTF-8: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// The file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document-conversion collaborator rejected the file.
    #[error("File processing failed for {file}: {detail}")]
    Conversion { file: String, detail: String },

    // ── API errors ────────────────────────────────────────────────────────
    /// The API key is empty or still the placeholder from the sample config.
    #[error("Invalid API key. Configure a real key (--api-key or GEMINI_API_KEY).")]
    InvalidCredential,

    /// The API accepted the call but returned nothing that parses as a review table.
    #[error("Model '{model}' returned no parseable review table")]
    EmptyResult { model: String },

    /// Network, HTTP or provider-level failure.
    #[error("Generation API error: {message}")]
    Transport { message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Refused to persist a table with no rows.
    #[error("Review table is empty. No data to save.")]
    EmptyTable,

    /// Could not create or write the results file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`ReviewError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Decode,
    Io,
    Conversion,
    InvalidCredential,
    EmptyResult,
    Transport,
    Config,
    Output,
    Internal,
}

impl ErrorKind {
    /// Kinds where a second attempt has a realistic chance of succeeding.
    ///
    /// The default retry policy does not consult this; see
    /// [`crate::pipeline::retry::RetryPolicy::retry_if`].
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::EmptyResult)
    }
}

impl ReviewError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReviewError::NotFound { .. } => ErrorKind::NotFound,
            ReviewError::Decode { .. } => ErrorKind::Decode,
            ReviewError::Io { .. } => ErrorKind::Io,
            ReviewError::Conversion { .. } => ErrorKind::Conversion,
            ReviewError::InvalidCredential => ErrorKind::InvalidCredential,
            ReviewError::EmptyResult { .. } => ErrorKind::EmptyResult,
            ReviewError::Transport { .. } => ErrorKind::Transport,
            ReviewError::InvalidConfig(_) => ErrorKind::Config,
            ReviewError::EmptyTable | ReviewError::OutputWriteFailed { .. } => ErrorKind::Output,
            ReviewError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        ReviewError::Transport {
            message: err.to_string(),
        }
    }
}
