//! CLI binary for ocr2xlsx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs a `Session` and prints the table.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr2xlsx::pipeline::export::download_data_uri;
use ocr2xlsx::pipeline::input::{parse_link_list, DEFAULT_UPLOAD_FOLDER};
use ocr2xlsx::{
    render_table, DocumentSource, PipelineConfig, ProgressCallback, RunOutput,
    RunProgressCallback, Session, EXPORT_FILE_NAME,
};
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus an inline line per
/// document, red for failures.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Processing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, _position: usize, _total: usize, label: &str) {
        self.bar.set_message(label.to_string());
    }

    fn on_document_complete(&self, position: usize, total: usize, name: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            green("✓"),
            position,
            total,
            name
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, position: usize, total: usize, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            red("✗"),
            position,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_documents: usize, success_count: usize) {
        let failed = total_documents.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} documents processed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents processed  ({} failed)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process every PDF/JPG/PNG in ./UPLOAD_FOLDER
  ocr2xlsx

  # Another folder, custom output file
  ocr2xlsx --dir scans/ -o shipments.xlsx

  # Shareable links, one per line
  ocr2xlsx --links-file links.txt
  cat links.txt | ocr2xlsx --links-file -
  ocr2xlsx --link https://example.com/invoice.pdf --link https://example.com/bol.png

  # Retry transient OCR failures, four documents at a time
  ocr2xlsx --max-retries 3 --concurrency 4

  # Structured output including the OCR text of each document
  ocr2xlsx --json > run.json
  ocr2xlsx --json --with-previews > run-with-previews.json

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY           OCR API key (never written to disk)
  OCR2XLSX_MODEL            Override model ID (default: mistral-ocr-latest)
  OCR2XLSX_BASE_URL         Override API base URL
  OCR2XLSX_UPLOAD_FOLDER    Override the upload folder
"#;

/// Send PDFs and images to Mistral OCR and export the rows to Excel.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2xlsx",
    version,
    about = "Send PDFs and images to Mistral OCR and export the rows to Excel",
    long_about = "Process every PDF/JPG/PNG document in an upload folder (or behind a list of \
shareable links) with Mistral OCR, then export one row per document (Date, Shipper Name, \
Weight, Volume, Final Amount) to an .xlsx file.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Upload folder to scan for .pdf, .jpg, .jpeg and .png files.
    #[arg(long, env = "OCR2XLSX_UPLOAD_FOLDER", default_value = DEFAULT_UPLOAD_FOLDER)]
    dir: PathBuf,

    /// File with newline-separated links ('-' reads stdin). Replaces --dir.
    #[arg(long, conflicts_with = "link")]
    links_file: Option<PathBuf>,

    /// A shareable link to process. Repeatable. Replaces --dir.
    #[arg(long)]
    link: Vec<String>,

    /// OCR API key.
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OCR model ID.
    #[arg(long, env = "OCR2XLSX_MODEL", default_value = ocr2xlsx::pipeline::ocr::DEFAULT_MODEL)]
    model: String,

    /// OCR API base URL.
    #[arg(long, env = "OCR2XLSX_BASE_URL", default_value = ocr2xlsx::pipeline::ocr::DEFAULT_BASE_URL)]
    base_url: String,

    /// Write the spreadsheet here.
    #[arg(short, long, env = "OCR2XLSX_OUTPUT", default_value = EXPORT_FILE_NAME)]
    output: PathBuf,

    /// Number of documents processed at once.
    #[arg(short, long, env = "OCR2XLSX_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Retries per document on transient OCR failures.
    #[arg(long, env = "OCR2XLSX_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Initial retry backoff in milliseconds (doubles each retry).
    #[arg(long, env = "OCR2XLSX_RETRY_BACKOFF_MS", default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Do not ask the service to embed page images in its response.
    #[arg(long)]
    no_include_images: bool,

    /// HTTP download timeout for links in seconds.
    #[arg(long, env = "OCR2XLSX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-document OCR call timeout in seconds.
    #[arg(long, env = "OCR2XLSX_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Output structured JSON (RunOutput) instead of the table.
    #[arg(long)]
    json: bool,

    /// Keep each document's data: URI preview in the --json output.
    #[arg(long, requires = "json")]
    with_previews: bool,

    /// Print the OCR text of each document after the table.
    #[arg(long)]
    show_text: bool,

    /// Print the exported workbook as a data: URI download link.
    #[arg(long)]
    data_uri: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR2XLSX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2XLSX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2XLSX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RunProgressCallback>)
    } else {
        None
    };

    let source = build_source(&cli)?;
    let config = build_config(&cli, progress_cb)?;
    let mut session = Session::new(config);

    // ── Run ──────────────────────────────────────────────────────────────
    let mut output = session.run(&source).await.context("Processing failed")?.clone();
    if !cli.with_previews {
        for outcome in &mut output.outcomes {
            outcome.preview_uri = None;
        }
    }

    let written = session
        .export_to(&cli.output)
        .with_context(|| format!("Failed to export {}", cli.output.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_report(&cli, &output);
    }

    if cli.data_uri {
        if let Some(bytes) = session.export_bytes()? {
            println!("{}", download_data_uri(&bytes));
        }
    }

    if !cli.quiet {
        if written {
            eprintln!(
                "{}  {} rows  {}ms  →  {}",
                if output.stats.failed_documents == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                output.table.len(),
                output.stats.total_duration_ms,
                bold(&cli.output.display().to_string()),
            );
        } else {
            eprintln!("{} No rows extracted; nothing exported.", red("✘"));
        }
    }

    Ok(())
}

/// Print the table, inline errors and (optionally) the OCR text.
fn print_report(cli: &Cli, output: &RunOutput) {
    if !output.table.is_empty() {
        println!("{}", bold("Extracted Data"));
        print!("{}", render_table(&output.table));
    }

    // The progress bar already printed errors inline.
    if cli.no_progress {
        for err in output.errors() {
            eprintln!("  {} {}", red("✗"), err);
        }
    }

    if cli.show_text {
        for outcome in output.outcomes.iter().filter(|o| o.is_success()) {
            println!();
            println!("{}", bold(&format!("── {} ──", outcome.name)));
            println!("{}", outcome.text.as_deref().unwrap_or_default());
            println!("{}", dim(&format!("{}ms", outcome.duration_ms)));
        }
    }
}

/// Pick the document source from the flags: links win over --dir.
fn build_source(cli: &Cli) -> Result<DocumentSource> {
    if let Some(ref path) = cli.links_file {
        let text = if path.as_os_str() == "-" {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read links from stdin")?;
            buf
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read links from {:?}", path))?
        };
        return Ok(DocumentSource::Links(parse_link_list(&text)));
    }

    if !cli.link.is_empty() {
        return Ok(DocumentSource::Links(parse_link_list(&cli.link.join("\n"))));
    }

    Ok(DocumentSource::Directory(cli.dir.clone()))
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .model(cli.model.clone())
        .base_url(cli.base_url.clone())
        .include_image_base64(!cli.no_include_images)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
