//! OCR stage: staged file → plain text.
//!
//! The recognizer does the work; this stage only adds timing and logging so
//! every backend reports the same way.

use crate::error::TimetableError;
use crate::providers::TextRecognizer;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

/// Transcribe the document at `path`.
///
/// An empty string is a valid result (no text detected); it is passed on to
/// extraction rather than treated as an error.
pub async fn recognize_text(
    recognizer: &dyn TextRecognizer,
    path: &Path,
    mime_type: &str,
) -> Result<String, TimetableError> {
    let start = Instant::now();
    let text = recognizer.recognize(path, mime_type).await?;
    let elapsed = start.elapsed().as_millis();

    if text.trim().is_empty() {
        warn!("OCR found no text in {} ({}ms)", path.display(), elapsed);
    } else {
        debug!(
            "OCR produced {} chars from {} in {}ms",
            text.chars().count(),
            path.display(),
            elapsed
        );
    }
    Ok(text)
}
