//! Input resolution: turn an upload folder or a list of links into documents.
//!
//! Resolution happens in two steps. [`plan_inputs`] validates the source up
//! front (folder exists, at least one eligible entry) so configuration
//! problems stop the run before any OCR call. Each [`PendingDocument`] is
//! then loaded on its own inside the per-document loop; a bad link only
//! fails that one document.

use crate::document::{is_supported, Document};
use crate::error::{DocumentError, Ocr2XlsxError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default relative upload folder.
pub const DEFAULT_UPLOAD_FOLDER: &str = "UPLOAD_FOLDER";

/// Where the documents of a run come from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Every supported file directly inside a local folder.
    Directory(PathBuf),
    /// Shareable links, fetched with a plain GET each.
    Links(Vec<String>),
}

impl DocumentSource {
    /// Build a link source from newline-separated text.
    pub fn from_link_list(text: &str) -> Self {
        DocumentSource::Links(parse_link_list(text))
    }
}

impl Default for DocumentSource {
    fn default() -> Self {
        DocumentSource::Directory(PathBuf::from(DEFAULT_UPLOAD_FOLDER))
    }
}

/// A document that has been located but not yet loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingDocument {
    Local(PathBuf),
    Remote(String),
}

impl PendingDocument {
    /// Display label before the bytes are loaded.
    pub fn label(&self) -> String {
        match self {
            PendingDocument::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            PendingDocument::Remote(url) => url.clone(),
        }
    }

    /// Load the bytes: read the file, or download the link.
    pub async fn load(&self, client: &reqwest::Client) -> Result<Document, DocumentError> {
        match self {
            PendingDocument::Local(path) => load_file(path).await,
            PendingDocument::Remote(url) => fetch_link(client, url).await,
        }
    }
}

/// Split newline-separated text into links, dropping blank lines.
pub fn parse_link_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate a source and list the documents it will yield, in order.
///
/// # Errors
/// - [`Ocr2XlsxError::MissingDirectory`] if the folder does not exist
/// - [`Ocr2XlsxError::NoInput`] if there is nothing eligible to process
pub fn plan_inputs(source: &DocumentSource) -> Result<Vec<PendingDocument>, Ocr2XlsxError> {
    match source {
        DocumentSource::Directory(dir) => Ok(list_directory(dir)?
            .into_iter()
            .map(PendingDocument::Local)
            .collect()),
        DocumentSource::Links(links) => {
            if links.is_empty() {
                return Err(Ocr2XlsxError::NoInput {
                    detail: "no links were provided".into(),
                });
            }
            Ok(links.iter().cloned().map(PendingDocument::Remote).collect())
        }
    }
}

/// List the supported files of a folder, sorted by file name.
pub fn list_directory(dir: &Path) -> Result<Vec<PathBuf>, Ocr2XlsxError> {
    if !dir.is_dir() {
        return Err(Ocr2XlsxError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| Ocr2XlsxError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(is_supported)
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(Ocr2XlsxError::NoInput {
            detail: format!("no .pdf, .jpg, .jpeg or .png files in '{}'", dir.display()),
        });
    }

    info!("Found {} eligible files in {}", files.len(), dir.display());
    Ok(files)
}

/// Read a local file into a [`Document`].
async fn load_file(path: &Path) -> Result<Document, DocumentError> {
    let name = PendingDocument::Local(path.to_path_buf()).label();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DocumentError::ReadFailed {
            name: name.clone(),
            detail: e.to_string(),
        })?;
    debug!("Read {} ({} bytes)", path.display(), bytes.len());
    Ok(Document::new(name, path.display().to_string(), bytes))
}

/// Build the HTTP client used for link downloads.
pub fn build_download_client(timeout_secs: u64) -> Result<reqwest::Client, Ocr2XlsxError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Ocr2XlsxError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Download a link into a [`Document`].
pub async fn fetch_link(client: &reqwest::Client, url: &str) -> Result<Document, DocumentError> {
    info!("Downloading file from: {}", url);

    let fetch_err = |reason: String| DocumentError::Fetch {
        url: url.to_string(),
        reason,
    };

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            fetch_err("request timed out".into())
        } else {
            fetch_err(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(fetch_err(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
    let name = filename_from_url(url);
    debug!("Downloaded {} ({} bytes)", name, bytes.len());

    Ok(Document::new(name, url, bytes.to_vec()))
}

/// File name from the final path segment of a URL.
pub fn filename_from_url(url: &str) -> String {
    let from_path = reqwest::Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });

    // Fall back to a plain split for strings the URL parser rejects.
    let last = from_path.unwrap_or_else(|| {
        url.split(['?', '#'])
            .next()
            .unwrap_or("")
            .rsplit('/')
            .next()
            .unwrap_or("")
            .to_string()
    });

    if last.is_empty() {
        "document".to_string()
    } else {
        last
    }
}
