//! Pipeline stages for timetable extraction.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own with fake providers.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ ocr ──▶ extract ──▶ postprocess
//! (multipart) (Vision) (Gemini)   (fences, envelope)
//! ```
//!
//! 1. [`upload`] : accept one file, check type and size, stage it on disk
//! 2. [`ocr`] : transcribe the staged file through a [`crate::providers::TextRecognizer`]
//! 3. [`extract`] : build the prompt and call a [`crate::providers::GenerativeModel`]
//! 4. [`postprocess`] : turn the untrusted reply into the `blocks` array
//!
//! Only `ocr` and `extract` do network I/O. The staged file is removed by
//! the handler once the request finishes, whatever the outcome.

pub mod extract;
pub mod ocr;
pub mod postprocess;
pub mod upload;
