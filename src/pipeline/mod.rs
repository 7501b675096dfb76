//! Pipeline stages for a design review.
//!
//! ## Data Flow
//!
//! ```text
//! paths ──▶ normalize ──▶ extract ──▶ ReviewTable
//!          (pdfium/utf-8) (schema-constrained call)
//!                └──────── retry ────────┘
//! ```
//!
//! 1. [`normalize`] — read every document as text and concatenate them under
//!    per-file banners; runs in `spawn_blocking` because pdfium is not
//!    async-safe
//! 2. [`extract`]   — one structured-generation request; the only stage with
//!    network I/O
//! 3. [`retry`]     — repeats normalize + extract with exponential backoff

pub mod extract;
pub mod normalize;
pub mod retry;
