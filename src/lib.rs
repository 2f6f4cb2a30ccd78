//! # timetable-ocr
//!
//! Turn an uploaded school timetable (PDF, DOCX or image) into structured
//! timetable blocks.
//!
//! ## Why this crate?
//!
//! Timetables come as scans, screenshots and exported documents with wildly
//! different layouts. Rather than parsing each layout, this crate runs the
//! document through OCR and asks a generative model to map the raw text onto
//! a fixed six-field block schema (day, start, end, subject, room, teacher).
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Upload    check type and size, stage in the upload dir
//!  ├─ 2. OCR       Google Cloud Vision DOCUMENT_TEXT_DETECTION
//!  ├─ 3. Extract   Vertex AI Gemini (or any edgequake-llm provider)
//!  ├─ 4. Parse     strip fences, parse JSON, check the `blocks` envelope
//!  └─ 5. Respond   {fileName, mimeType, blocks}; staged file deleted
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use timetable_ocr::{serve, AppState, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .project_id("my-gcp-project")
//!         .build()?;
//!     let state = AppState::from_config(&config)?;
//!     serve(&config, state).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `timetable-ocr` binary (clap + anyhow + tracing-subscriber + dotenvy) |
//!
//! Disable `cli` when embedding the router in another service:
//! ```toml
//! timetable-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod handler;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServiceConfig, ServiceConfigBuilder, DEFAULT_MAX_UPLOAD_BYTES};
pub use error::{ExtractionFailure, TimetableError};
pub use handler::{RequestStage, TimetableHandler};
pub use output::{DayOfWeek, TimetableBlock, TimetableResult};
pub use pipeline::upload::{SupportedMime, UploadLimits};
pub use providers::{
    build_collaborators, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    GenerativeModel, TextRecognizer,
};
pub use server::{router, serve, AppState, LIVENESS_MESSAGE};
