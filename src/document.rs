//! The in-memory document handed from the source adapter to the encoder.

use serde::{Deserialize, Serialize};

/// File suffixes accepted from the upload folder.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = [".pdf", ".jpg", ".jpeg", ".png"];

/// Media kind inferred from the file name.
///
/// Classification looks at the suffix only; the bytes are never sniffed.
/// Anything that is neither a PDF nor a JPEG is treated as PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Pdf,
    Jpeg,
    Png,
}

impl MediaKind {
    /// Classify a file name by its suffix.
    pub fn from_name(name: &str) -> Self {
        if name.ends_with(".pdf") {
            MediaKind::Pdf
        } else if name.ends_with(".jpg") || name.ends_with(".jpeg") {
            MediaKind::Jpeg
        } else {
            MediaKind::Png
        }
    }

    /// MIME type used in data URIs.
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaKind::Pdf => "application/pdf",
            MediaKind::Jpeg => "image/jpeg",
            MediaKind::Png => "image/png",
        }
    }

    pub fn is_image(self) -> bool {
        !matches!(self, MediaKind::Pdf)
    }
}

/// Whether a file name carries one of [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(name: &str) -> bool {
    SUPPORTED_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// A loaded document. Immutable once created.
#[derive(Debug, Clone)]
pub struct Document {
    /// File name, used for classification and display.
    pub name: String,
    /// Local path or URL the bytes came from.
    pub origin: String,
    pub bytes: Vec<u8>,
    pub kind: MediaKind,
}

impl Document {
    pub fn new(name: impl Into<String>, origin: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let kind = MediaKind::from_name(&name);
        Self {
            name,
            origin: origin.into(),
            bytes,
            kind,
        }
    }
}
