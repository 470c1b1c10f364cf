//! Field extraction: normalised OCR text → one [`ExtractedRow`].
//!
//! Only a placeholder implementation exists. The target document schema
//! (which labels carry the shipper, how weights and amounts are written) is
//! not known, so [`PlaceholderExtractor`] returns fixed strings. A real
//! extractor plugs in through [`FieldExtractor`] via
//! [`crate::config::PipelineConfigBuilder::extractor`] without any change to
//! the pipeline.

use crate::output::ExtractedRow;

/// Derives business fields from normalised text.
pub trait FieldExtractor: Send + Sync {
    fn extract_fields(&self, text: &str) -> ExtractedRow;
}

/// Returns the same five placeholder values for every document.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderExtractor;

impl FieldExtractor for PlaceholderExtractor {
    fn extract_fields(&self, _text: &str) -> ExtractedRow {
        ExtractedRow {
            date: "Extracted Date".into(),
            shipper_name: "Extracted Shipper Name".into(),
            weight: "Extracted Weight".into(),
            volume: "Extracted Volume".into(),
            final_amount: "Extracted Final Amount".into(),
        }
    }
}
