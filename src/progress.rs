//! Progress-callback trait for per-document run events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through each document. The CLI uses it to
//! drive its progress bar and to print per-document errors inline.
//!
//! # Example
//!
//! ```rust
//! use ocr2xlsx::{PipelineConfig, RunProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     failed: AtomicUsize,
//! }
//!
//! impl RunProgressCallback for CountingCallback {
//!     fn on_document_error(&self, position: usize, total: usize, error: &str) {
//!         self.failed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("document {position}/{total} failed: {error}");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { failed: AtomicUsize::new(0) });
//! let config = PipelineConfig::builder()
//!     .progress_callback(cb as Arc<dyn RunProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each document.
///
/// All methods have default no-op implementations. With `concurrency > 1`
/// the per-document methods may be called from several tasks at once.
pub trait RunProgressCallback: Send + Sync {
    /// Called once, after inputs are validated and before the first document.
    fn on_run_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before a document is loaded.
    ///
    /// `position` is 1-indexed in submission order.
    fn on_document_start(&self, position: usize, total: usize, label: &str) {
        let _ = (position, total, label);
    }

    /// Called when a document produced a row.
    fn on_document_complete(&self, position: usize, total: usize, name: &str) {
        let _ = (position, total, name);
    }

    /// Called when a document failed (download, read, or OCR).
    fn on_document_error(&self, position: usize, total: usize, error: &str) {
        let _ = (position, total, error);
    }

    /// Called once after every document has been attempted.
    fn on_run_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
