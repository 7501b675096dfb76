//! # edgequake-docreview
//!
//! Review design documents against their requirements with a
//! structured-output LLM.
//!
//! ## Why this crate?
//!
//! A design review compares a requirements specification with the design
//! that answers it, item by item, and records a verdict for each
//! requirement. This crate feeds every document of a review round to a
//! model in one request and asks for a table constrained to a fixed
//! eight-column schema, so the result can be saved or diffed without any
//! free-text parsing.
//!
//! ## Pipeline Overview
//!
//! ```text
//! documents (PDF / Markdown)
//!  │
//!  ├─ 1. Normalize  text per file, provenance banner, concatenate
//!  ├─ 2. Extract    one schema-constrained request, temperature 0
//!  ├─ 3. Retry      up to N attempts, 3 s → 6 s → 12 s backoff
//!  └─ 4. Output     ReviewTable (+ optional 第N回.json / .md)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docreview::{review, ReviewConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReviewConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .build()?;
//!     let output = review(["spec_V6.pdf", "spec_V7.pdf"], &config).await?;
//!     eprintln!("{} rows in {}ms", output.stats.rows, output.stats.duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docreview` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docreview = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod credential;
pub mod diagnostics;
pub mod error;
pub mod observer;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod review;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{GenerationRequest, GenerationResponse, SharedBackend, StructuredBackend};
pub use config::{ReviewConfig, ReviewConfigBuilder, VersionMarkers};
pub use error::{ErrorKind, ReviewError};
pub use observer::{NoopObserver, ReviewObserver};
pub use output::{OutputFormat, ReviewOutput, ReviewStats};
pub use pipeline::extract::ExtractionClient;
pub use pipeline::normalize::{normalize, DocumentConverter};
pub use pipeline::retry::{ReviewOrchestrator, RetryPolicy};
pub use review::{review, review_sync, review_to_file};
pub use schema::{ReviewRow, ReviewTable, Verdict};
