//! Per-request orchestration: staged upload → OCR → extraction → result.
//!
//! A request moves through
//!
//! ```text
//! Received → FileValidated → TextExtracted → StructureExtracted → Responded
//!     └──────────────┴───────────────┴─────────────────┴──▶ Failed
//! ```
//!
//! `Received → FileValidated` happens in [`crate::pipeline::upload`]; the
//! remaining transitions happen here. The staged file is deleted once the
//! request reaches a terminal state, whichever one it is.

use crate::error::TimetableError;
use crate::output::TimetableResult;
use crate::pipeline::upload::UploadedFile;
use crate::pipeline::{extract, ocr};
use crate::providers::{GenerationConfig, GenerativeModel, TextRecognizer};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Lifecycle stage of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Received,
    FileValidated,
    TextExtracted,
    StructureExtracted,
    Responded,
    Failed,
}

impl RequestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStage::Received => "received",
            RequestStage::FileValidated => "file_validated",
            RequestStage::TextExtracted => "text_extracted",
            RequestStage::StructureExtracted => "structure_extracted",
            RequestStage::Responded => "responded",
            RequestStage::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log a stage transition at `debug`.
pub fn log_transition(from: RequestStage, to: RequestStage) {
    debug!(stage_from = %from, stage_to = %to, "Request stage {} -> {}", from, to);
}

/// Log a failure at `error` with the stage it happened in.
pub fn log_failure(stage: RequestStage, err: &TimetableError) {
    error!(
        stage = %stage,
        class = err.class(),
        "Request failed during {}: {}",
        stage,
        err
    );
    log_transition(stage, RequestStage::Failed);
}

/// Runs OCR and extraction with shared, immutable collaborators.
///
/// Built once at startup and shared across requests behind an `Arc`.
pub struct TimetableHandler {
    recognizer: Arc<dyn TextRecognizer>,
    model: Arc<dyn GenerativeModel>,
    generation: GenerationConfig,
}

impl TimetableHandler {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        model: Arc<dyn GenerativeModel>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            recognizer,
            model,
            generation,
        }
    }

    pub fn generation_config(&self) -> GenerationConfig {
        self.generation
    }

    /// OCR and structure one file already on disk.
    ///
    /// The file is left in place; callers own its lifetime.
    pub async fn extract_file(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<Vec<Value>, TimetableError> {
        self.run(path, mime_type).await.map_err(|(stage, e)| {
            log_failure(stage, &e);
            e
        })
    }

    /// Process a validated upload and delete it afterwards.
    pub async fn process_upload(
        &self,
        upload: UploadedFile,
    ) -> Result<TimetableResult, TimetableError> {
        let start = Instant::now();
        log_transition(RequestStage::Received, RequestStage::FileValidated);

        let outcome = self.run(upload.path(), upload.mime_type()).await;

        let file_name = upload.original_name().to_string();
        let mime_type = upload.mime_type().to_string();
        upload.discard();

        match outcome {
            Ok(blocks) => {
                log_transition(RequestStage::StructureExtracted, RequestStage::Responded);
                info!(
                    "Extracted {} blocks from '{}' in {}ms",
                    blocks.len(),
                    file_name,
                    start.elapsed().as_millis()
                );
                Ok(TimetableResult {
                    file_name,
                    mime_type,
                    blocks,
                })
            }
            Err((stage, e)) => {
                log_failure(stage, &e);
                Err(e)
            }
        }
    }

    /// The two remote steps. Errors carry the stage they interrupted.
    async fn run(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<Vec<Value>, (RequestStage, TimetableError)> {
        let text = ocr::recognize_text(self.recognizer.as_ref(), path, mime_type)
            .await
            .map_err(|e| (RequestStage::FileValidated, e))?;
        log_transition(RequestStage::FileValidated, RequestStage::TextExtracted);

        let blocks = extract::extract_blocks(self.model.as_ref(), &text, self.generation)
            .await
            .map_err(|e| (RequestStage::TextExtracted, e))?;
        log_transition(RequestStage::TextExtracted, RequestStage::StructureExtracted);

        Ok(blocks)
    }
}
