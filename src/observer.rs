//! Observer trait for review-run events.
//!
//! Inject an [`Arc<dyn ReviewObserver>`] via
//! [`crate::config::ReviewConfigBuilder::observer`] to follow a run as it
//! moves through attempts and backoff waits. Nothing in the pipeline depends
//! on what the observer does, so it can be omitted in tests.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docreview::{ReviewConfig, ReviewObserver};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct AttemptCounter(AtomicU32);
//!
//! impl ReviewObserver for AttemptCounter {
//!     fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("attempt {attempt}/{max_attempts}");
//!     }
//! }
//!
//! let config = ReviewConfig::builder()
//!     .observer(Arc::new(AttemptCounter(AtomicU32::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ReviewError;
use std::sync::Arc;
use std::time::Duration;

/// Called by the review pipeline as it runs.
///
/// All methods default to no-ops. Attempt numbers are 1-based.
pub trait ReviewObserver: Send + Sync {
    /// Called once, before the first attempt.
    fn on_review_start(&self, documents: usize) {
        let _ = documents;
    }

    /// Called before each attempt.
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    /// Called when an attempt fails, whether or not another follows.
    fn on_attempt_failed(&self, attempt: u32, max_attempts: u32, error: &ReviewError) {
        let _ = (attempt, max_attempts, error);
    }

    /// Called before the backoff wait that precedes `next_attempt`.
    fn on_retry_scheduled(&self, next_attempt: u32, delay: Duration) {
        let _ = (next_attempt, delay);
    }

    /// Called once when an attempt succeeds.
    fn on_review_complete(&self, rows: usize, attempts: u32) {
        let _ = (rows, attempts);
    }

    /// Called once when the run gives up; `error` is what the caller receives.
    fn on_review_failed(&self, attempts: u32, error: &ReviewError) {
        let _ = (attempts, error);
    }
}

/// Default observer.
pub struct NoopObserver;

impl ReviewObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ReviewConfig`].
pub type SharedObserver = Arc<dyn ReviewObserver>;
