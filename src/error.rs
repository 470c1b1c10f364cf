//! Error types for the ocr2xlsx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Ocr2XlsxError`] — **Fatal**: the run cannot start or cannot finish
//!   (upload folder missing, nothing to process, export could not be
//!   written). Returned as `Err(Ocr2XlsxError)` from the top-level `run*`
//!   functions, always before the first OCR call for input problems.
//!
//! * [`DocumentError`] — **Non-fatal**: a single document failed (bad link,
//!   OCR service error) but every other document is still processed. Stored
//!   inside [`crate::output::DocumentOutcome`] so callers can show the
//!   failure inline next to the rows that did succeed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr2xlsx library.
///
/// Per-document failures use [`DocumentError`] and are stored in
/// [`crate::output::DocumentOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Ocr2XlsxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The configured upload folder does not exist.
    #[error("The folder '{path}' does not exist. Please create it and add files.")]
    MissingDirectory { path: PathBuf },

    /// The upload folder exists but could not be listed.
    #[error("Failed to list folder '{path}': {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Nothing eligible to process: no supported files or no links.
    #[error("No valid files found: {detail}")]
    NoInput { detail: String },

    // ── Service errors ────────────────────────────────────────────────────
    /// Neither an API key nor a pre-built OCR service was supplied.
    #[error("OCR service is not configured.\n{hint}")]
    ServiceNotConfigured { hint: String },

    /// Some documents succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::RunOutput::into_result`] when the caller
    /// wants to treat any document failure as an error.
    #[error("{failed}/{total} documents failed during processing")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── Export errors ─────────────────────────────────────────────────────
    /// The spreadsheet writer rejected the table.
    #[error("Failed to build spreadsheet: {0}")]
    ExportFailed(String),

    /// Could not create or write the exported spreadsheet file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rust_xlsxwriter::XlsxError> for Ocr2XlsxError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Ocr2XlsxError::ExportFailed(e.to_string())
    }
}

/// A non-fatal error for a single document.
///
/// The run continues with the remaining documents; the failing one simply
/// contributes no row to the result table.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// A shareable link could not be downloaded.
    #[error("Failed to download file from link {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// A local file was listed but could not be read.
    #[error("Failed to read '{name}': {detail}")]
    ReadFailed { name: String, detail: String },

    /// The OCR service call failed after all attempts.
    #[error("OCR failed for '{name}' after {attempts} attempt(s): {detail}")]
    Service {
        name: String,
        attempts: u32,
        detail: String,
    },
}

impl DocumentError {
    /// Name or URL of the document the error belongs to.
    pub fn subject(&self) -> &str {
        match self {
            DocumentError::Fetch { url, .. } => url,
            DocumentError::ReadFailed { name, .. } => name,
            DocumentError::Service { name, .. } => name,
        }
    }
}
