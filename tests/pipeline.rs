//! End-to-end tests for the ocr2xlsx pipeline.
//!
//! Every network peer is local: an axum server on `127.0.0.1:0` plays both
//! the file host behind shareable links and the OCR endpoint, so these tests
//! run offline and without an API key.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use calamine::{open_workbook, Data, Reader, Xlsx};
use ocr2xlsx::{
    run, run_to_file, DocumentError, DocumentSource, EncodedRequest, ExtractedRow,
    FieldExtractor, Ocr2XlsxError, OcrPage, OcrResponse, OcrService, PipelineConfig,
    ResultTable, RunProgressCallback, ServiceError, COLUMN_HEADERS, EXPORT_FILE_NAME,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Serve `app` on an ephemeral local port and return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Fake OCR endpoint: records each request and answers with one page whose
/// markdown names the payload type. The first `fail_first` calls get a 503.
#[derive(Clone, Default)]
struct FakeOcr {
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    fail_first: Arc<AtomicUsize>,
}

impl FakeOcr {
    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, i: usize) -> (Option<String>, Value) {
        self.requests.lock().unwrap()[i].clone()
    }
}

async fn fake_ocr_handler(
    State(state): State<FakeOcr>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let kind = body["document"]["type"].as_str().unwrap_or("?").to_string();
    state.requests.lock().unwrap().push((auth, body));

    let remaining = state.fail_first.load(Ordering::SeqCst);
    if remaining > 0 {
        state.fail_first.store(remaining - 1, Ordering::SeqCst);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"message": "overloaded"})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "pages": [{"index": 0, "markdown": format!("# {kind}"), "images": []}],
            "model": "mistral-ocr-latest"
        })),
    )
}

async fn start_fake_ocr(fake: FakeOcr) -> String {
    let app = Router::new()
        .route("/v1/ocr", post(fake_ocr_handler))
        .with_state(fake);
    serve(app).await
}

/// File host with two documents; every other path is a 404.
async fn start_file_host() -> String {
    let app = Router::new()
        .route("/share/invoice.pdf", get(|| async { b"%PDF-1.7 invoice".to_vec() }))
        .route("/share/receipt.png", get(|| async { vec![0x89u8, b'P', b'N', b'G'] }));
    serve(app).await
}

fn config_for(ocr_url: &str) -> PipelineConfig {
    PipelineConfig::builder()
        .api_key("test-key")
        .base_url(ocr_url)
        .retry_backoff_ms(1)
        .build()
        .expect("valid config")
}

fn read_sheet(path: &Path) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("readable workbook");
    let range = workbook.worksheet_range("Sheet1").expect("Sheet1 exists");
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::String(s) => s.clone(),
                    Data::Empty => String::new(),
                    other => format!("{other:?}"),
                })
                .collect()
        })
        .collect()
}

/// Test double: the document bytes are `ok:<tag>` or `bad:<tag>`; `bad`
/// documents fail with a 500, `ok` documents echo their bytes as markdown.
struct ByContent;

#[async_trait::async_trait]
impl OcrService for ByContent {
    fn name(&self) -> &str {
        "by-content"
    }

    async fn process(&self, request: &EncodedRequest) -> Result<OcrResponse, ServiceError> {
        let b64 = match request {
            EncodedRequest::DocumentBase64 { document_base64 } => document_base64.clone(),
            EncodedRequest::ImageUrl { image_url } => {
                image_url.split(',').nth(1).unwrap_or_default().to_string()
            }
        };
        let text = String::from_utf8(STANDARD.decode(b64).unwrap()).unwrap();
        if text.starts_with("bad:") {
            return Err(ServiceError::Status {
                status: 500,
                message: format!("cannot read {text}"),
            });
        }
        Ok(OcrResponse::Paged {
            pages: vec![OcrPage {
                index: Some(0),
                markdown: Some(text),
            }],
            model: None,
        })
    }
}

/// Copies the OCR text into the Date column so row order can be observed.
struct EchoExtractor;

impl FieldExtractor for EchoExtractor {
    fn extract_fields(&self, text: &str) -> ExtractedRow {
        ExtractedRow {
            date: text.to_string(),
            shipper_name: String::new(),
            weight: String::new(),
            volume: String::new(),
            final_amount: String::new(),
        }
    }
}

// ── Local folder scenarios ───────────────────────────────────────────────────

#[tokio::test]
async fn single_pdf_in_folder_produces_one_exported_row() {
    let fake = FakeOcr::default();
    let ocr_url = start_fake_ocr(fake.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let upload = dir.path().join("UPLOAD_FOLDER");
    std::fs::create_dir(&upload).unwrap();
    std::fs::write(upload.join("invoice.pdf"), b"%PDF-1.7").unwrap();
    let out_path = dir.path().join(EXPORT_FILE_NAME);

    let output = run_to_file(
        &DocumentSource::Directory(upload),
        &out_path,
        &config_for(&ocr_url),
    )
    .await
    .expect("run should succeed");

    // Gateway invoked exactly once with a document payload
    assert_eq!(fake.calls(), 1);
    let (auth, body) = fake.request(0);
    assert_eq!(auth.as_deref(), Some("Bearer test-key"));
    assert_eq!(body["model"], "mistral-ocr-latest");
    assert_eq!(body["include_image_base64"], true);
    assert_eq!(body["document"]["type"], "document_base64");
    assert_eq!(
        body["document"]["document_base64"],
        STANDARD.encode(b"%PDF-1.7")
    );

    // Normalised text feeds one placeholder row
    assert_eq!(output.table.len(), 1);
    assert_eq!(output.outcomes[0].text.as_deref(), Some("# document_base64"));
    assert_eq!(
        output.outcomes[0].preview_uri.as_deref(),
        Some(format!("data:application/pdf;base64,{}", STANDARD.encode(b"%PDF-1.7")).as_str())
    );
    let row = &output.table.rows()[0];
    assert_eq!(row.date, "Extracted Date");
    assert_eq!(row.shipper_name, "Extracted Shipper Name");
    assert_eq!(row.weight, "Extracted Weight");
    assert_eq!(row.volume, "Extracted Volume");
    assert_eq!(row.final_amount, "Extracted Final Amount");

    // Exported file: header + 1 data row
    let sheet = read_sheet(&out_path);
    assert_eq!(sheet.len(), 2);
    assert_eq!(sheet[0], COLUMN_HEADERS);
}

#[tokio::test]
async fn empty_folder_halts_before_any_ocr_call() {
    let fake = FakeOcr::default();
    let ocr_url = start_fake_ocr(fake.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("readme.txt"), b"not a document").unwrap();

    let err = run(
        &DocumentSource::Directory(dir.path().to_path_buf()),
        &config_for(&ocr_url),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Ocr2XlsxError::NoInput { .. }), "got {err:?}");
    assert_eq!(fake.calls(), 0);
}

#[tokio::test]
async fn missing_folder_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::builder()
        .service(Arc::new(ByContent))
        .build()
        .unwrap();

    let err = run(&DocumentSource::Directory(dir.path().join("nope")), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, Ocr2XlsxError::MissingDirectory { .. }));
}

#[tokio::test]
async fn image_files_are_sent_as_data_uri() {
    let fake = FakeOcr::default();
    let ocr_url = start_fake_ocr(fake.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("scan.jpg"), [0xFFu8, 0xD8, 0xFF]).unwrap();

    run(
        &DocumentSource::Directory(dir.path().to_path_buf()),
        &config_for(&ocr_url),
    )
    .await
    .unwrap();

    let (_, body) = fake.request(0);
    assert_eq!(body["document"]["type"], "image_url");
    assert_eq!(
        body["document"]["image_url"],
        format!("data:image/jpeg;base64,{}", STANDARD.encode([0xFFu8, 0xD8, 0xFF]))
    );
    assert!(body["document"].get("image_base64").is_none());
}

// ── Remote link scenarios ────────────────────────────────────────────────────

#[tokio::test]
async fn broken_link_is_reported_and_run_continues() {
    let fake = FakeOcr::default();
    let ocr_url = start_fake_ocr(fake.clone()).await;
    let host = start_file_host().await;

    let good = format!("{host}/share/invoice.pdf");
    let missing = format!("{host}/share/missing.pdf");
    let source = DocumentSource::from_link_list(&format!("{good}\n{missing}\n"));

    let output = run(&source, &config_for(&ocr_url)).await.unwrap();

    assert_eq!(output.table.len(), 1);
    assert_eq!(output.stats.failed_documents, 1);
    assert_eq!(fake.calls(), 1);

    assert_eq!(output.outcomes[0].name, "invoice.pdf");
    let errors: Vec<&DocumentError> = output.errors().collect();
    assert_eq!(errors.len(), 1);
    match errors[0] {
        DocumentError::Fetch { url, reason } => {
            assert_eq!(url, &missing);
            assert!(reason.contains("404"), "reason: {reason}");
        }
        other => panic!("expected Fetch error, got {other:?}"),
    }
    assert!(output.into_result().is_err());
}

#[tokio::test]
async fn no_file_is_written_when_every_document_fails() {
    let fake = FakeOcr::default();
    let ocr_url = start_fake_ocr(fake.clone()).await;
    let host = start_file_host().await;

    let source = DocumentSource::Links(vec![
        format!("{host}/share/gone.pdf"),
        format!("{host}/share/also-gone.png"),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join(EXPORT_FILE_NAME);

    let output = run_to_file(&source, &out_path, &config_for(&ocr_url))
        .await
        .expect("per-document failures do not fail the run");

    assert!(output.table.is_empty());
    assert_eq!(output.stats.failed_documents, 2);
    assert!(output.outcomes.iter().all(|o| o.preview_uri.is_none()));
    assert_eq!(fake.calls(), 0);
    assert!(!out_path.exists());
}

#[tokio::test]
async fn link_file_name_drives_media_kind() {
    let fake = FakeOcr::default();
    let ocr_url = start_fake_ocr(fake.clone()).await;
    let host = start_file_host().await;

    let source = DocumentSource::Links(vec![format!("{host}/share/receipt.png")]);
    let output = run(&source, &config_for(&ocr_url)).await.unwrap();

    assert_eq!(output.outcomes[0].name, "receipt.png");
    let (_, body) = fake.request(0);
    assert!(body["document"]["image_url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

// ── Batch isolation and ordering ─────────────────────────────────────────────

async fn run_mixed_batch(concurrency: usize) -> ocr2xlsx::RunOutput {
    let dir = tempfile::tempdir().unwrap();
    let contents = ["ok:1", "bad:2", "ok:3", "ok:4", "bad:5", "ok:6"];
    for (i, c) in contents.iter().enumerate() {
        // Alternate kinds; names sort in submission order
        let ext = if i % 2 == 0 { "pdf" } else { "png" };
        std::fs::write(dir.path().join(format!("doc{i}.{ext}")), c).unwrap();
    }

    let config = PipelineConfig::builder()
        .service(Arc::new(ByContent))
        .extractor(Arc::new(EchoExtractor))
        .concurrency(concurrency)
        .build()
        .unwrap();

    run(&DocumentSource::Directory(dir.path().to_path_buf()), &config)
        .await
        .unwrap()
}

#[tokio::test]
async fn failed_documents_leave_no_row_and_order_is_kept() {
    for concurrency in [1, 4] {
        let output = run_mixed_batch(concurrency).await;

        // N = 6, K = 2
        assert_eq!(output.stats.total_documents, 6);
        assert_eq!(output.table.len(), 4);
        assert_eq!(output.stats.failed_documents, 2);

        let dates: Vec<&str> = output.table.rows().iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, ["ok:1", "ok:3", "ok:4", "ok:6"], "concurrency {concurrency}");

        let failed: Vec<usize> = output
            .outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.position)
            .collect();
        assert_eq!(failed, [2, 5]);
    }
}

#[tokio::test]
async fn transient_ocr_failures_are_retried_when_enabled() {
    let fake = FakeOcr::default();
    fake.fail_first.store(2, Ordering::SeqCst);
    let ocr_url = start_fake_ocr(fake.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();

    let config = PipelineConfig::builder()
        .api_key("test-key")
        .base_url(&ocr_url)
        .max_retries(3)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    let output = run(&DocumentSource::Directory(dir.path().to_path_buf()), &config)
        .await
        .unwrap();
    assert_eq!(fake.calls(), 3);
    assert_eq!(output.table.len(), 1);
    assert_eq!(output.outcomes[0].retries, 2);
}

#[tokio::test]
async fn default_config_does_not_retry() {
    let fake = FakeOcr::default();
    fake.fail_first.store(1, Ordering::SeqCst);
    let ocr_url = start_fake_ocr(fake.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();

    let output = run(
        &DocumentSource::Directory(dir.path().to_path_buf()),
        &config_for(&ocr_url),
    )
    .await
    .unwrap();

    assert_eq!(fake.calls(), 1);
    assert!(output.table.is_empty());
    let err = output.errors().next().unwrap().to_string();
    assert!(err.contains("503"), "got: {err}");
}

/// Answers every request with the same raw body.
struct FixedBody(&'static str);

#[async_trait::async_trait]
impl OcrService for FixedBody {
    fn name(&self) -> &str {
        "fixed-body"
    }

    async fn process(&self, _request: &EncodedRequest) -> Result<OcrResponse, ServiceError> {
        OcrResponse::from_json(self.0)
    }
}

#[tokio::test]
async fn malformed_page_list_keeps_the_row_with_error_text() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();

    let config = PipelineConfig::builder()
        .service(Arc::new(FixedBody(r#"[{"markdown": "ok"}, 7]"#)))
        .extractor(Arc::new(EchoExtractor))
        .build()
        .unwrap();

    let output = run(&DocumentSource::Directory(dir.path().to_path_buf()), &config)
        .await
        .unwrap();

    assert_eq!(output.table.len(), 1);
    let text = output.outcomes[0].text.as_deref().unwrap();
    assert!(text.starts_with("Error extracting result:"), "got: {text}");
    assert_eq!(output.table.rows()[0].date, text);
}

#[tokio::test]
async fn error_body_with_success_status_fails_the_document() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();

    let config = PipelineConfig::builder()
        .service(Arc::new(FixedBody(r#"{"message": "Unauthorized"}"#)))
        .build()
        .unwrap();

    let output = run(&DocumentSource::Directory(dir.path().to_path_buf()), &config)
        .await
        .unwrap();

    assert!(output.table.is_empty());
    match output.errors().next() {
        Some(DocumentError::Service { detail, .. }) => {
            assert!(detail.contains("Unauthorized"), "detail: {detail}")
        }
        other => panic!("expected Service error, got {other:?}"),
    };
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    final_success: AtomicUsize,
}

impl RunProgressCallback for Counting {
    fn on_document_start(&self, _position: usize, _total: usize, _label: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_document_complete(&self, _position: usize, _total: usize, _name: &str) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_document_error(&self, _position: usize, _total: usize, _error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_run_complete(&self, _total: usize, success_count: usize) {
        self.final_success.store(success_count, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_callback_sees_every_document() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.pdf"), b"ok:a").unwrap();
    std::fs::write(dir.path().join("b.pdf"), b"bad:b").unwrap();

    let counter = Arc::new(Counting::default());
    let config = PipelineConfig::builder()
        .service(Arc::new(ByContent))
        .progress_callback(counter.clone() as Arc<dyn RunProgressCallback>)
        .build()
        .unwrap();

    run(&DocumentSource::Directory(dir.path().to_path_buf()), &config)
        .await
        .unwrap();

    assert_eq!(counter.started.load(Ordering::SeqCst), 2);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 1);
    assert_eq!(counter.failed.load(Ordering::SeqCst), 1);
    assert_eq!(counter.final_success.load(Ordering::SeqCst), 1);
}

// ── Export round trip ────────────────────────────────────────────────────────

#[test]
fn exported_table_reads_back_unchanged() {
    let table: ResultTable = (1..=3)
        .map(|i| ExtractedRow {
            date: format!("2024-01-0{i}"),
            shipper_name: format!("Shipper {i}"),
            weight: format!("{i}0 kg"),
            volume: format!("{i}.5 m3"),
            final_amount: format!("€ {i}00,00"),
        })
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(EXPORT_FILE_NAME);
    ocr2xlsx::write_xlsx(&table, &path).unwrap();

    let sheet = read_sheet(&path);
    assert_eq!(sheet.len(), 1 + table.len());
    assert_eq!(sheet[0], COLUMN_HEADERS);
    for (read, row) in sheet[1..].iter().zip(table.rows()) {
        assert_eq!(read.len(), 5, "no index column");
        assert_eq!(read, &row.cells());
    }
}
