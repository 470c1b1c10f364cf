//! Result export: render the table for the terminal and write it as `.xlsx`.
//!
//! The workbook has a single sheet with one bold header row and one row per
//! document; there is no index column. Each export is a full rewrite.

use crate::error::Ocr2XlsxError;
use crate::output::{ResultTable, COLUMN_HEADERS};
use crate::pipeline::encode::data_uri;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rust_xlsxwriter::{Format, Workbook};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Fixed file name of the exported spreadsheet.
pub const EXPORT_FILE_NAME: &str = "extracted_data.xlsx";

/// Sheet name (matches the default of common spreadsheet writers).
pub const SHEET_NAME: &str = "Sheet1";

/// MIME type of `.xlsx` files.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Excel's per-cell character limit.
const MAX_CELL_CHARS: usize = 32_767;

/// Render the table as aligned plain text: a header line, a rule, then rows.
pub fn render_table(table: &ResultTable) -> String {
    let mut widths: Vec<usize> = COLUMN_HEADERS.iter().map(|h| h.chars().count()).collect();
    for row in table.rows() {
        for (w, cell) in widths.iter_mut().zip(row.cells()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: [&str; 5]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(COLUMN_HEADERS));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    out.push('\n');
    for row in table.rows() {
        out.push_str(&line(row.cells()));
        out.push('\n');
    }
    out
}

/// Serialise the table to `.xlsx` bytes.
pub fn to_xlsx_bytes(table: &ResultTable) -> Result<Vec<u8>, Ocr2XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new().set_bold();

    for (col, header) in COLUMN_HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        worksheet.set_column_width(col as u16, 24)?;
    }

    for (row_idx, row) in table.rows().iter().enumerate() {
        let r = (row_idx + 1) as u32;
        for (col, value) in row.cells().iter().enumerate() {
            worksheet.write_string(r, col as u16, clip_cell(value))?;
        }
    }

    let bytes = workbook.save_to_buffer()?;
    debug!("Built workbook: {} rows, {} bytes", table.len(), bytes.len());
    Ok(bytes)
}

/// Write the table to `path`, replacing any previous file.
///
/// The bytes go to a temporary file in the same directory first and are
/// renamed into place, so readers never see a half-written workbook.
pub fn write_xlsx(table: &ResultTable, path: impl AsRef<Path>) -> Result<(), Ocr2XlsxError> {
    let path = path.as_ref();
    let bytes = to_xlsx_bytes(table)?;

    let write_err = |source: std::io::Error| Ocr2XlsxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(&bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Exported {} rows to {}", table.len(), path.display());
    Ok(())
}

/// `data:` URI for offering the exported workbook as a download.
pub fn download_data_uri(xlsx_bytes: &[u8]) -> String {
    data_uri(XLSX_MIME, &STANDARD.encode(xlsx_bytes))
}

fn clip_cell(value: &str) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((byte_idx, _)) => &value[..byte_idx],
        None => value,
    }
}
