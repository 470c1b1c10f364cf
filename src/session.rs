//! Per-user application state.
//!
//! A [`Session`] owns the configuration (including the API key) and the
//! result of the latest run. Starting a new run clears the previous result
//! first, so a failed run never leaves stale rows behind. Nothing held here
//! is written to disk except through an explicit export.

use crate::config::PipelineConfig;
use crate::error::Ocr2XlsxError;
use crate::output::{ResultTable, RunOutput};
use crate::pipeline::export;
use crate::pipeline::input::DocumentSource;
use crate::run::run;
use std::path::Path;

/// Application state for one user session.
#[derive(Debug)]
pub struct Session {
    config: PipelineConfig,
    last_run: Option<RunOutput>,
}

impl Session {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            last_run: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process `source`, replacing any previous result.
    pub async fn run(&mut self, source: &DocumentSource) -> Result<&RunOutput, Ocr2XlsxError> {
        self.last_run = None;
        let output = run(source, &self.config).await?;
        Ok(self.last_run.insert(output))
    }

    /// Result of the latest successful run.
    pub fn last_run(&self) -> Option<&RunOutput> {
        self.last_run.as_ref()
    }

    /// Table of the latest run, if it produced any rows.
    pub fn table(&self) -> Option<&ResultTable> {
        self.last_run
            .as_ref()
            .map(|o| &o.table)
            .filter(|t| !t.is_empty())
    }

    /// Serialise the latest table to `.xlsx` bytes.
    ///
    /// Returns `Ok(None)` when there is nothing to export.
    pub fn export_bytes(&self) -> Result<Option<Vec<u8>>, Ocr2XlsxError> {
        self.table().map(export::to_xlsx_bytes).transpose()
    }

    /// Write the latest table to `path`. Returns whether a file was written.
    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<bool, Ocr2XlsxError> {
        match self.table() {
            Some(table) => {
                export::write_xlsx(table, path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Forget the latest result.
    pub fn reset(&mut self) {
        self.last_run = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::EncodedRequest;
    use crate::pipeline::ocr::{OcrPage, OcrResponse, OcrService, ServiceError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl OcrService for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn process(&self, _request: &EncodedRequest) -> Result<OcrResponse, ServiceError> {
            Ok(OcrResponse::Sequence(vec![OcrPage {
                index: Some(0),
                markdown: Some("text".into()),
            }]))
        }
    }

    fn session() -> Session {
        let config = PipelineConfig::builder()
            .service(Arc::new(Echo))
            .build()
            .unwrap();
        Session::new(config)
    }

    #[tokio::test]
    async fn run_stores_result() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();

        let mut s = session();
        assert!(s.last_run().is_none());
        let rows = s
            .run(&DocumentSource::Directory(dir.path().to_path_buf()))
            .await
            .unwrap()
            .table
            .len();
        assert_eq!(rows, 1);
        assert!(s.table().is_some());
        assert!(s.export_bytes().unwrap().is_some());
    }

    #[tokio::test]
    async fn new_run_resets_previous_result() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"img").unwrap();

        let mut s = session();
        s.run(&DocumentSource::Directory(dir.path().to_path_buf()))
            .await
            .unwrap();
        assert!(s.last_run().is_some());

        // Second run fails before processing; the old rows must not survive.
        let missing = dir.path().join("missing");
        assert!(s.run(&DocumentSource::Directory(missing)).await.is_err());
        assert!(s.last_run().is_none());
        assert!(s.export_bytes().unwrap().is_none());
    }

    #[test]
    fn export_without_result_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(export::EXPORT_FILE_NAME);
        assert!(!session().export_to(&path).unwrap());
        assert!(!path.exists());
    }
}
