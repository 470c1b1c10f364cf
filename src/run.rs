//! Run entry points: source → OCR → rows → table.
//!
//! A run validates its input first, so a missing upload folder or an empty
//! link list stops it before any OCR call is made. After that every
//! document is isolated: a download, read or OCR failure is recorded in its
//! [`DocumentOutcome`] and the remaining documents carry on. Rows are
//! appended in submission order regardless of `concurrency`.

use crate::config::PipelineConfig;
use crate::error::{DocumentError, Ocr2XlsxError};
use crate::output::{DocumentOutcome, ExtractedRow, ResultTable, RunOutput, RunStats};
use crate::pipeline::export;
use crate::pipeline::input::{self, DocumentSource, PendingDocument};
use crate::pipeline::ocr::{self, MistralOcrClient, OcrService};
use crate::pipeline::{encode, normalize};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Environment variable read when no API key is configured.
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Process every document of `source` and collect the result table.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(RunOutput)` once every document was attempted, even if some failed
/// (check `output.stats.failed_documents` or `output.errors()`).
///
/// # Errors
/// Returns `Err(Ocr2XlsxError)` only for fatal errors, all raised before
/// the first document is processed:
/// - upload folder missing or unreadable
/// - no eligible files / no links
/// - OCR service not configured, invalid configuration
pub async fn run(
    source: &DocumentSource,
    config: &PipelineConfig,
) -> Result<RunOutput, Ocr2XlsxError> {
    let total_start = Instant::now();
    config.validate()?;

    // ── Step 1: Validate and list inputs ─────────────────────────────────
    let pending = input::plan_inputs(source)?;
    let total = pending.len();
    info!("Starting run: {} documents", total);

    // ── Step 2: Get/create the OCR service ───────────────────────────────
    let service = resolve_service(config)?;
    let client = input::build_download_client(config.download_timeout_secs)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    // ── Step 3: Process documents in submission order ────────────────────
    let processed: Vec<Processed> = stream::iter(pending.iter().enumerate().map(|(i, doc)| {
        process_document(service.as_ref(), &client, doc, i + 1, total, config)
    }))
    .buffered(config.concurrency)
    .collect()
    .await;

    // ── Step 4: Assemble the table ───────────────────────────────────────
    let mut table = ResultTable::new();
    let mut outcomes = Vec::with_capacity(processed.len());
    for p in processed {
        if let Some(row) = p.row {
            table.push(row);
        }
        outcomes.push(p.outcome);
    }

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    let stats = RunStats {
        total_documents: total,
        processed_documents: table.len(),
        failed_documents: failed,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Run complete: {}/{} documents, {}ms total",
        stats.processed_documents, total, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, stats.processed_documents);
    }

    Ok(RunOutput {
        table,
        outcomes,
        stats,
    })
}

/// Run, then export the table to `output_path` as `.xlsx`.
///
/// The file is only written when at least one document produced a row.
pub async fn run_to_file(
    source: &DocumentSource,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<RunOutput, Ocr2XlsxError> {
    let output = run(source, config).await?;
    let path = output_path.as_ref();

    if output.table.is_empty() {
        warn!("No rows extracted; not writing {}", path.display());
    } else {
        export::write_xlsx(&output.table, path)?;
    }

    Ok(output)
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    source: &DocumentSource,
    config: &PipelineConfig,
) -> Result<RunOutput, Ocr2XlsxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Ocr2XlsxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(source, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// One document's outcome plus its row, if it produced one.
struct Processed {
    outcome: DocumentOutcome,
    row: Option<ExtractedRow>,
}

/// Resolve the OCR service, from most-specific to least-specific:
///
/// 1. a pre-built service in `config.service`
/// 2. `config.api_key`
/// 3. the `MISTRAL_API_KEY` environment variable
fn resolve_service(config: &PipelineConfig) -> Result<Arc<dyn OcrService>, Ocr2XlsxError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }

    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
        .ok_or_else(|| Ocr2XlsxError::ServiceNotConfigured {
            hint: format!("Please enter your API key (--api-key or {API_KEY_ENV}) to continue."),
        })?;

    let client = MistralOcrClient::with_options(
        api_key,
        config.model.clone(),
        config.base_url.clone(),
        config.api_timeout_secs,
        config.include_image_base64,
    )
    .map_err(|e| Ocr2XlsxError::Internal(e.to_string()))?;
    info!("Using {} with model {}", client.name(), client.model());

    Ok(Arc::new(client))
}

/// Load, encode, OCR, normalise and extract one document.
///
/// Always returns. A failure is recorded in the outcome rather than
/// propagated, so one bad document never aborts the run.
async fn process_document(
    service: &dyn OcrService,
    client: &reqwest::Client,
    pending: &PendingDocument,
    position: usize,
    total: usize,
    config: &PipelineConfig,
) -> Processed {
    let start = Instant::now();
    let label = pending.label();

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(position, total, &label);
    }

    let result = async {
        let doc = pending.load(client).await?;
        let encoded = encode::encode_document(&doc);
        let call = ocr::process_with_retry(
            service,
            &doc.name,
            &encoded.request,
            config.max_retries,
            config.retry_backoff_ms,
        )
        .await?;
        let text = normalize::normalize(&call.response);
        debug!("{}: {} chars of text", doc.name, text.len());
        Ok::<_, DocumentError>((doc.name, text, encoded.preview_uri, call.retries))
    }
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok((name, text, preview_uri, retries)) => {
            let row = config.extractor.extract_fields(&text);
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_complete(position, total, &name);
            }
            Processed {
                outcome: DocumentOutcome {
                    position,
                    name,
                    text: Some(text),
                    preview_uri: Some(preview_uri),
                    duration_ms,
                    retries,
                    error: None,
                },
                row: Some(row),
            }
        }
        Err(e) => {
            warn!("Document {}/{} ({}) failed: {}", position, total, label, e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_error(position, total, &e.to_string());
            }
            let retries = match &e {
                DocumentError::Service { attempts, .. } => attempts.saturating_sub(1),
                _ => 0,
            };
            Processed {
                outcome: DocumentOutcome {
                    position,
                    name: label,
                    text: None,
                    preview_uri: None,
                    duration_ms,
                    retries,
                    error: Some(e),
                },
                row: None,
            }
        }
    }
}
