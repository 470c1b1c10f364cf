//! # ocr2xlsx
//!
//! Send PDF and image documents to the Mistral OCR service and export one
//! row per document to an Excel sheet.
//!
//! ## Pipeline Overview
//!
//! ```text
//! UPLOAD_FOLDER/ or links
//!  │
//!  ├─ 1. Input      list supported files / download each link
//!  ├─ 2. Encode     PDF → document_base64, image → image_url data URI
//!  ├─ 3. OCR        POST /v1/ocr (mistral-ocr-latest)
//!  ├─ 4. Normalise  join page markdown ("No result found." when empty)
//!  ├─ 5. Extract    Date / Shipper Name / Weight / Volume / Final Amount
//!  └─ 6. Export     extracted_data.xlsx
//! ```
//!
//! Documents are independent: a broken link or a failed OCR call is
//! reported for that document and the others still produce rows.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr2xlsx::{run_to_file, DocumentSource, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder().api_key("your-key").build()?;
//!     let source = DocumentSource::Directory("UPLOAD_FOLDER".into());
//!     let output = run_to_file(&source, "extracted_data.xlsx", &config).await?;
//!     for err in output.errors() {
//!         eprintln!("{err}");
//!     }
//!     println!("{} rows", output.table.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2xlsx` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod run;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use document::{Document, MediaKind};
pub use error::{DocumentError, Ocr2XlsxError};
pub use output::{DocumentOutcome, ExtractedRow, ResultTable, RunOutput, RunStats, COLUMN_HEADERS};
pub use pipeline::encode::{EncodedDocument, EncodedRequest};
pub use pipeline::export::{render_table, to_xlsx_bytes, write_xlsx, EXPORT_FILE_NAME};
pub use pipeline::extract::{FieldExtractor, PlaceholderExtractor};
pub use pipeline::input::DocumentSource;
pub use pipeline::ocr::{MistralOcrClient, OcrPage, OcrResponse, OcrService, ServiceError};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use run::{run, run_sync, run_to_file};
pub use session::Session;
