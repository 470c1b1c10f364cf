//! Result types produced by a processing run.

use crate::error::{DocumentError, Ocr2XlsxError};
use serde::{Deserialize, Serialize};

/// Column headers of the result table, in export order.
pub const COLUMN_HEADERS: [&str; 5] = ["Date", "Shipper Name", "Weight", "Volume", "Final Amount"];

/// One row of business fields derived from a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Shipper Name")]
    pub shipper_name: String,
    #[serde(rename = "Weight")]
    pub weight: String,
    #[serde(rename = "Volume")]
    pub volume: String,
    #[serde(rename = "Final Amount")]
    pub final_amount: String,
}

impl ExtractedRow {
    /// Cell values in [`COLUMN_HEADERS`] order.
    pub fn cells(&self) -> [&str; 5] {
        [
            &self.date,
            &self.shipper_name,
            &self.weight,
            &self.volume,
            &self.final_amount,
        ]
    }
}

/// Ordered rows, one per successfully processed document.
///
/// Rebuilt from scratch on every run; rows are never merged across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultTable {
    rows: Vec<ExtractedRow>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ExtractedRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ExtractedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<ExtractedRow> for ResultTable {
    fn from_iter<I: IntoIterator<Item = ExtractedRow>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// What happened to one input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutcome {
    /// 1-indexed position in submission order.
    pub position: usize,
    /// File name, or the URL when the download itself failed.
    pub name: String,
    /// Normalised OCR text; `None` when the document failed.
    pub text: Option<String>,
    /// `data:` URI of the submitted document, for previews.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_uri: Option<String>,
    pub duration_ms: u64,
    /// Retries spent on the OCR call (0 = first attempt succeeded).
    pub retries: u32,
    pub error: Option<DocumentError>,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_documents: usize,
    pub processed_documents: usize,
    pub failed_documents: usize,
    pub total_duration_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub table: ResultTable,
    pub outcomes: Vec<DocumentOutcome>,
    pub stats: RunStats,
}

impl RunOutput {
    /// Per-document failures, in submission order.
    pub fn errors(&self) -> impl Iterator<Item = &DocumentError> {
        self.outcomes.iter().filter_map(|o| o.error.as_ref())
    }

    /// Turn any per-document failure into [`Ocr2XlsxError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, Ocr2XlsxError> {
        if self.stats.failed_documents > 0 {
            return Err(Ocr2XlsxError::PartialFailure {
                success: self.stats.processed_documents,
                failed: self.stats.failed_documents,
                total: self.stats.total_documents,
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tag: &str) -> ExtractedRow {
        ExtractedRow {
            date: format!("{tag}-date"),
            shipper_name: format!("{tag}-shipper"),
            weight: format!("{tag}-weight"),
            volume: format!("{tag}-volume"),
            final_amount: format!("{tag}-amount"),
        }
    }

    #[test]
    fn cells_follow_header_order() {
        let r = row("a");
        assert_eq!(
            r.cells(),
            ["a-date", "a-shipper", "a-weight", "a-volume", "a-amount"]
        );
    }

    #[test]
    fn row_serialises_with_column_headers() {
        let json = serde_json::to_value(row("x")).unwrap();
        for header in COLUMN_HEADERS {
            assert!(json.get(header).is_some(), "missing {header}");
        }
    }

    #[test]
    fn table_keeps_insertion_order() {
        let table: ResultTable = ["1", "2", "3"].iter().map(|t| row(t)).collect();
        let dates: Vec<_> = table.rows().iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, ["1-date", "2-date", "3-date"]);
    }

    #[test]
    fn into_result_reports_partial_failure() {
        let output = RunOutput {
            table: ResultTable::new(),
            outcomes: vec![],
            stats: RunStats {
                total_documents: 2,
                processed_documents: 1,
                failed_documents: 1,
                total_duration_ms: 0,
            },
        };
        match output.into_result() {
            Err(Ocr2XlsxError::PartialFailure { failed, total, .. }) => {
                assert_eq!((failed, total), (1, 2));
            }
            other => panic!("expected PartialFailure, got {other:?}"),
        }
    }
}
