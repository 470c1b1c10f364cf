//! Configuration types for a processing run.
//!
//! All run behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The defaults reproduce the plain behaviour of
//! one OCR call per document, one document at a time.

use crate::error::Ocr2XlsxError;
use crate::pipeline::extract::{FieldExtractor, PlaceholderExtractor};
use crate::pipeline::ocr::{OcrService, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Configuration for a processing run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr2xlsx::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .api_key("sk-...")
///     .concurrency(4)
///     .max_retries(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "mistral-ocr-latest");
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// OCR API key. Held in memory only and never written anywhere.
    ///
    /// When `None` and no `service` is injected, `MISTRAL_API_KEY` is read
    /// from the environment at run time.
    pub api_key: Option<String>,

    /// OCR model identifier. Default: `mistral-ocr-latest`.
    pub model: String,

    /// API base URL. Default: `https://api.mistral.ai`.
    pub base_url: String,

    /// Ask the service to embed page images in its response. Default: true.
    ///
    /// The images are not used downstream but the flag is part of the
    /// request contract.
    pub include_image_base64: bool,

    /// Number of documents in flight at once. Default: 1 (sequential).
    ///
    /// Results keep submission order whatever the value.
    pub concurrency: usize,

    /// Retry attempts on a transient OCR failure. Default: 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Download timeout for link inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-OCR-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Pre-constructed OCR service. Takes precedence over `api_key`.
    pub service: Option<Arc<dyn OcrService>>,

    /// Field extractor applied to each document's text.
    pub extractor: Arc<dyn FieldExtractor>,

    /// Optional per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            include_image_base64: true,
            concurrency: 1,
            max_retries: 0,
            retry_backoff_ms: 500,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            service: None,
            extractor: Arc::new(PlaceholderExtractor),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("include_image_base64", &self.include_image_base64)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("service", &self.service.as_ref().map(|s| s.name().to_string()))
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn include_image_base64(mut self, v: bool) -> Self {
        self.config.include_image_base64 = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn service(mut self, service: Arc<dyn OcrService>) -> Self {
        self.config.service = Some(service);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn FieldExtractor>) -> Self {
        self.config.extractor = extractor;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Ocr2XlsxError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl PipelineConfig {
    /// Check invariants that the public fields could have broken.
    pub fn validate(&self) -> Result<(), Ocr2XlsxError> {
        if self.model.trim().is_empty() {
            return Err(Ocr2XlsxError::InvalidConfig(
                "Model identifier must not be empty".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(Ocr2XlsxError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Ocr2XlsxError::InvalidConfig(format!(
                "Base URL must be http(s), got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }
}
