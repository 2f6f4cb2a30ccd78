//! Error types for the timetable-ocr library.
//!
//! Two types reflect two layers of failure:
//!
//! * [`TimetableError`]: everything that can end a request: rejected input,
//!   an unreachable or failing cloud provider, a model reply that breaks the
//!   output contract, or local I/O trouble while staging the upload.
//!
//! * [`ExtractionFailure`]: the named reasons a model completion can be
//!   unusable. It is produced by the parse-and-validate step in
//!   [`crate::pipeline::postprocess`] and carried inside
//!   [`TimetableError::Extraction`].
//!
//! The HTTP layer collapses every non-client error into one response shape;
//! [`TimetableError::class`] keeps the distinction visible in logs.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the timetable-ocr library.
#[derive(Debug, Error)]
pub enum TimetableError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The multipart body carried no `file` part (or was not multipart at all).
    #[error("No file uploaded")]
    MissingFile,

    /// The uploaded file's MIME type is not accepted.
    #[error("Unsupported file type '{mime_type}'")]
    UnsupportedType { mime_type: String },

    /// The uploaded file is larger than the configured ceiling.
    #[error("File exceeds the {limit_bytes} byte upload limit")]
    FileTooLarge { limit_bytes: u64 },

    /// The multipart stream itself could not be read.
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    // ── Provider errors ───────────────────────────────────────────────────
    /// The OCR provider could not be reached or rejected the request.
    #[error("OCR request failed: {message}")]
    OcrFailed { message: String },

    /// The generative-model provider could not be reached or rejected the request.
    #[error("Generative model request failed: {message}")]
    GenerationFailed { message: String },

    /// The selected LLM provider could not be initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Credentials for the Google Cloud APIs could not be obtained.
    #[error("Could not obtain Google Cloud credentials: {0}")]
    Credentials(String),

    // ── Contract errors ───────────────────────────────────────────────────
    /// The model replied, but the reply is not a usable timetable envelope.
    #[error(transparent)]
    Extraction(#[from] ExtractionFailure),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing a staged upload failed.
    #[error("File I/O failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TimetableError {
    /// True for errors caused by the request itself rather than by processing.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TimetableError::MissingFile
                | TimetableError::UnsupportedType { .. }
                | TimetableError::FileTooLarge { .. }
                | TimetableError::MalformedUpload(_)
        )
    }

    /// Short label for structured logs.
    pub fn class(&self) -> &'static str {
        match self {
            TimetableError::MissingFile
            | TimetableError::UnsupportedType { .. }
            | TimetableError::FileTooLarge { .. }
            | TimetableError::MalformedUpload(_) => "input_rejected",
            TimetableError::OcrFailed { .. }
            | TimetableError::GenerationFailed { .. }
            | TimetableError::Credentials(_) => "upstream_failure",
            TimetableError::Extraction(_) => "contract_violation",
            TimetableError::Io { .. } => "io",
            TimetableError::ProviderNotConfigured { .. } | TimetableError::InvalidConfig(_) => {
                "config"
            }
        }
    }
}

/// Why a model completion could not be turned into timetable blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    /// No candidate, or a candidate without content parts.
    #[error("No candidate returned from the generative model")]
    NoCandidate,

    /// The cleaned completion text is not valid JSON.
    #[error("Generative model returned invalid JSON")]
    InvalidJson { raw: String },

    /// Valid JSON, but no `blocks` array at the top level.
    #[error("Generative model JSON missing 'blocks' array")]
    MissingBlocks,
}
