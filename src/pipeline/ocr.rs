//! OCR gateway: submit an encoded document to the OCR service.
//!
//! The gateway is the only stage with network I/O to the OCR provider. It
//! hides the provider behind the [`OcrService`] trait so the pipeline can be
//! driven by the real [`MistralOcrClient`] or by any injected test double.
//!
//! The response body is decoded once, here, into [`OcrResponse`]: a tagged
//! union over the shapes the service is known to return. Downstream stages
//! never inspect raw JSON.
//!
//! ## Retry Strategy
//!
//! [`process_with_retry`] defaults to a single attempt (`max_retries = 0`).
//! When retries are enabled, only transient failures (transport errors,
//! timeouts, HTTP 429 and 5xx) are retried, with exponential backoff
//! `retry_backoff_ms * 2^(attempt - 1)`.

use crate::error::DocumentError;
use crate::pipeline::encode::EncodedRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Default OCR model identifier.
pub const DEFAULT_MODEL: &str = "mistral-ocr-latest";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";

// ── Response types ──────────────────────────────────────────────────────────

/// One page of OCR output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub index: Option<u32>,
    /// Page text as markdown. `None` when the service omitted the field.
    #[serde(default)]
    pub markdown: Option<String>,
}

/// Decoded OCR response.
///
/// The variants are tried in order: an object carrying a `pages` list, a
/// bare list of pages, then anything else kept verbatim.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OcrResponse {
    Paged {
        pages: Vec<OcrPage>,
        #[serde(default)]
        model: Option<String>,
    },
    Sequence(Vec<OcrPage>),
    Unrecognised(serde_json::Value),
}

impl OcrResponse {
    /// Decode a response body.
    pub fn from_json(body: &str) -> Result<Self, ServiceError> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| ServiceError::Decode(e.to_string()))?;
        if let Some(message) = upstream_error(&value) {
            return Err(ServiceError::Upstream(message));
        }
        serde_json::from_value(value).map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

/// Keys an error body may carry besides its `message`.
const ERROR_OBJECT_KEYS: &[&str] = &["message", "detail", "object", "type", "code", "param"];

/// Detect an error object sent with a success status.
fn upstream_error(value: &serde_json::Value) -> Option<String> {
    let obj = value.as_object()?;
    if obj.contains_key("pages") {
        return None;
    }
    let only_error_keys = obj.keys().all(|k| ERROR_OBJECT_KEYS.contains(&k.as_str()));
    let is_error = obj.get("object").and_then(|o| o.as_str()) == Some("error")
        || obj.contains_key("detail")
        || (obj.contains_key("message") && only_error_keys);
    if !is_error {
        return None;
    }
    let message = obj
        .get("message")
        .or_else(|| obj.get("detail"))
        .map(|m| match m {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| value.to_string());
    Some(message)
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Failure of a single OCR service call.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// The service answered with a non-success status.
    #[error("OCR API error ({status}): {message}")]
    Status { status: u16, message: String },

    /// The request never got a response.
    #[error("OCR request {}: {detail}", transport_outcome(.timeout))]
    Transport { detail: String, timeout: bool },

    /// The response body was not valid JSON.
    #[error("OCR response could not be decoded: {0}")]
    Decode(String),

    /// The service returned an error object.
    #[error("OCR service reported an error: {0}")]
    Upstream(String),
}

fn transport_outcome(timeout: &bool) -> &'static str {
    if *timeout {
        "timed out"
    } else {
        "failed"
    }
}

impl ServiceError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Transport { .. } => true,
            ServiceError::Status { status, .. } => *status == 429 || *status >= 500,
            ServiceError::Decode(_) | ServiceError::Upstream(_) => false,
        }
    }
}

// ── Service trait ───────────────────────────────────────────────────────────

/// An OCR backend.
#[async_trait]
pub trait OcrService: Send + Sync {
    fn name(&self) -> &str;

    /// Submit one document and return the decoded response.
    async fn process(&self, request: &EncodedRequest) -> Result<OcrResponse, ServiceError>;
}

// ── Mistral client ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OcrRequestBody<'a> {
    model: &'a str,
    document: &'a EncodedRequest,
    include_image_base64: bool,
}

/// Client for the Mistral OCR endpoint (`POST {base_url}/v1/ocr`).
#[derive(Clone)]
pub struct MistralOcrClient {
    api_key: String,
    model: String,
    base_url: String,
    include_image_base64: bool,
    client: reqwest::Client,
}

impl fmt::Debug for MistralOcrClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MistralOcrClient")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("include_image_base64", &self.include_image_base64)
            .finish()
    }
}

impl MistralOcrClient {
    /// Create a client against the public API with a 60 s timeout.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ServiceError> {
        Self::with_options(api_key, model, DEFAULT_BASE_URL, 60, true)
    }

    pub fn with_options(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
        include_image_base64: bool,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ServiceError::Transport {
                detail: e.to_string(),
                timeout: false,
            })?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            include_image_base64,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/ocr", self.base_url)
    }
}

#[async_trait]
impl OcrService for MistralOcrClient {
    fn name(&self) -> &str {
        "mistral_ocr"
    }

    async fn process(&self, request: &EncodedRequest) -> Result<OcrResponse, ServiceError> {
        let body = OcrRequestBody {
            model: &self.model,
            document: request,
            include_image_base64: self.include_image_base64,
        };

        info!(
            "MistralOcrClient: calling OCR API ({}, {})",
            self.model,
            request.variant_name()
        );

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport {
                detail: e.to_string(),
                timeout: e.is_timeout(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status { status, message });
        }

        let raw_text = resp.text().await.map_err(|e| ServiceError::Transport {
            detail: e.to_string(),
            timeout: e.is_timeout(),
        })?;
        debug!(
            "MistralOcrClient: raw response ({} bytes): {}",
            raw_text.len(),
            raw_text.chars().take(500).collect::<String>()
        );

        OcrResponse::from_json(&raw_text)
    }
}

// ── Retry wrapper ───────────────────────────────────────────────────────────

/// A successful OCR call and the retries it took.
#[derive(Debug, Clone)]
pub struct OcrCall {
    pub response: OcrResponse,
    pub retries: u32,
}

/// Call the service, retrying transient failures up to `max_retries` times.
///
/// Never panics; a final failure becomes [`DocumentError::Service`] so the
/// caller can record it against the document and move on.
pub async fn process_with_retry(
    service: &dyn OcrService,
    name: &str,
    request: &EncodedRequest,
    max_retries: u32,
    retry_backoff_ms: u64,
) -> Result<OcrCall, DocumentError> {
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            let backoff = retry_backoff_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "{}: retry {}/{} after {}ms",
                name, attempt, max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match service.process(request).await {
            Ok(response) => {
                return Ok(OcrCall {
                    response,
                    retries: attempt,
                })
            }
            Err(e) => {
                warn!("{}: attempt {} failed: {}", name, attempt + 1, e);
                if !e.is_transient() || attempt >= max_retries {
                    return Err(DocumentError::Service {
                        name: name.to_string(),
                        attempts: attempt + 1,
                        detail: e.to_string(),
                    });
                }
            }
        }
        attempt += 1;
    }
}
