//! Document encoding: raw bytes → the tagged payload the OCR API expects.
//!
//! PDFs travel as whole-file base64 under `document_base64`. Images travel
//! as a `data:<mime>;base64,...` URI under `image_url`. The same image
//! contract is used whether the file came from the upload folder or from a
//! link, so the service sees one wire shape per media kind.

use crate::document::Document;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Request payload for one document. Exactly one variant is populated and
/// it always matches the document's [`MediaKind`](crate::document::MediaKind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EncodedRequest {
    DocumentBase64 { document_base64: String },
    ImageUrl { image_url: String },
}

impl EncodedRequest {
    pub fn variant_name(&self) -> &'static str {
        match self {
            EncodedRequest::DocumentBase64 { .. } => "document_base64",
            EncodedRequest::ImageUrl { .. } => "image_url",
        }
    }
}

/// An encoded request together with a data URI suitable for previewing.
#[derive(Debug, Clone)]
pub struct EncodedDocument {
    pub request: EncodedRequest,
    pub preview_uri: String,
}

/// Build a `data:` URI from a MIME type and base64 payload.
pub fn data_uri(mime_type: &str, b64: &str) -> String {
    format!("data:{mime_type};base64,{b64}")
}

/// Encode a document for the OCR service.
pub fn encode_document(doc: &Document) -> EncodedDocument {
    let b64 = STANDARD.encode(&doc.bytes);
    let preview_uri = data_uri(doc.kind.mime_type(), &b64);
    debug!(
        "Encoded {} ({:?}) → {} bytes base64",
        doc.name,
        doc.kind,
        b64.len()
    );

    let request = if doc.kind.is_image() {
        EncodedRequest::ImageUrl {
            image_url: preview_uri.clone(),
        }
    } else {
        EncodedRequest::DocumentBase64 {
            document_base64: b64,
        }
    };

    EncodedDocument {
        request,
        preview_uri,
    }
}
