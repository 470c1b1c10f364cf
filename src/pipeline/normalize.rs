//! Response normalisation: decoded OCR response → one text string.
//!
//! Normalisation never fails. An empty result becomes [`NO_RESULT`] and any
//! internal problem becomes an `"Error extracting result: ..."` string, so a
//! single odd response cannot break the per-document loop.

use crate::pipeline::ocr::{OcrPage, OcrResponse};
use serde_json::Value;
use thiserror::Error;

/// Text used when the response carried no page text at all.
pub const NO_RESULT: &str = "No result found.";

/// Separator between page texts.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Why page text could not be collected. Internal to this module; always
/// converted to placeholder text by [`normalize`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("page {position} has no markdown field")]
    MissingMarkdown { position: usize },

    #[error("'pages' is not a list of pages: {detail}")]
    MalformedPages { detail: String },

    #[error("page {position} is not a page object: {detail}")]
    MalformedPage { position: usize, detail: String },
}

/// The page sequence a response exposes.
///
/// `Paged` and `Sequence` yield their pages. Any other shape yields none,
/// except a list holding an element that is not a page, or an object whose
/// `pages` entry exists but could not be decoded.
pub fn pages_of(response: &OcrResponse) -> Result<&[OcrPage], NormalizationError> {
    match response {
        OcrResponse::Paged { pages, .. } => Ok(pages),
        OcrResponse::Sequence(pages) => Ok(pages),
        OcrResponse::Unrecognised(Value::Array(items)) => Err(malformed_page(items)),
        OcrResponse::Unrecognised(value) => match value.get("pages") {
            Some(pages) => Err(NormalizationError::MalformedPages {
                detail: truncate(&pages.to_string(), 80),
            }),
            None => Ok(&[]),
        },
    }
}

/// Name the first list element that does not decode as a page.
fn malformed_page(items: &[Value]) -> NormalizationError {
    let bad = items
        .iter()
        .enumerate()
        .find(|(_, item)| serde_json::from_value::<OcrPage>((*item).clone()).is_err());
    match bad {
        Some((i, item)) => NormalizationError::MalformedPage {
            position: i + 1,
            detail: truncate(&item.to_string(), 80),
        },
        None => NormalizationError::MalformedPages {
            detail: truncate(&Value::Array(items.to_vec()).to_string(), 80),
        },
    }
}

/// Join the markdown of every page with a blank line.
pub fn collect_text(response: &OcrResponse) -> Result<String, NormalizationError> {
    let pages = pages_of(response)?;
    let texts = pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            page.markdown
                .as_deref()
                .ok_or(NormalizationError::MissingMarkdown { position: i + 1 })
        })
        .collect::<Result<Vec<&str>, _>>()?;
    Ok(texts.join(PAGE_SEPARATOR))
}

/// Normalise a response to display text. Never returns an empty string.
pub fn normalize(response: &OcrResponse) -> String {
    match collect_text(response) {
        Ok(text) if text.is_empty() => NO_RESULT.to_string(),
        Ok(text) => text,
        Err(e) => format!("Error extracting result: {e}"),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push('\u{2026}');
        out
    } else {
        s.to_string()
    }
}
