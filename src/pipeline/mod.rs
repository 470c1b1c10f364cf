//! Pipeline stages for document OCR and table export.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ ocr ──▶ normalize ──▶ extract ──▶ export
//! (folder/links) (base64) (HTTP)  (pages→text)  (row)      (xlsx)
//! ```
//!
//! 1. [`input`]     — list the upload folder or fetch each link
//! 2. [`encode`]    — classify by suffix and build the tagged OCR payload
//! 3. [`ocr`]       — call the OCR service, optional retry/backoff; the only
//!    stage talking to the OCR provider
//! 4. [`normalize`] — join page markdown, with placeholder text on empty or
//!    malformed responses
//! 5. [`extract`]   — derive the five business fields (placeholder stub)
//! 6. [`export`]    — terminal table and `.xlsx` serialisation

pub mod encode;
pub mod export;
pub mod extract;
pub mod input;
pub mod normalize;
pub mod ocr;
