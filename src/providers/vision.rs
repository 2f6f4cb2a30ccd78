//! Google Cloud Vision OCR adapter.
//!
//! Images go to `images:annotate`; PDFs go to the synchronous
//! `files:annotate`, which reads at most five pages per call. Both use
//! `DOCUMENT_TEXT_DETECTION`, the dense-text model suited to printed tables.

use super::auth::GoogleAuth;
use super::TextRecognizer;
use crate::error::TimetableError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

const VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1";
const FEATURE: &str = "DOCUMENT_TEXT_DETECTION";
const PDF_MIME: &str = "application/pdf";
/// Pages `files:annotate` reads when the request names none.
const API_DEFAULT_PAGES: u32 = 5;

/// OCR backed by the Cloud Vision REST API.
pub struct CloudVisionRecognizer {
    client: reqwest::Client,
    auth: GoogleAuth,
    endpoint: String,
    pdf_max_pages: u32,
}

impl CloudVisionRecognizer {
    pub fn new(client: reqwest::Client, auth: GoogleAuth, pdf_max_pages: u32) -> Self {
        Self {
            client,
            auth,
            endpoint: VISION_ENDPOINT.to_string(),
            pdf_max_pages: pdf_max_pages.clamp(1, 5),
        }
    }

    /// Point the adapter at a different API root (e.g. a regional endpoint).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    async fn post(&self, method: &str, body: Value) -> Result<reqwest::Response, TimetableError> {
        let url = format!("{}/{}", self.endpoint, method);
        let request = self.auth.authorize(&self.client, self.client.post(&url)).await?;
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| TimetableError::OcrFailed {
                message: format!("Failed to send request to Cloud Vision: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TimetableError::OcrFailed {
                message: format!("Cloud Vision request failed: {status} - {error_text}"),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl TextRecognizer for CloudVisionRecognizer {
    async fn recognize(&self, path: &Path, mime_type: &str) -> Result<String, TimetableError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| TimetableError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let content = STANDARD.encode(&bytes);
        debug!("Sending {} bytes ({}) to Cloud Vision", bytes.len(), mime_type);

        if mime_type == PDF_MIME {
            let body = files_request_body(content, mime_type, self.pdf_max_pages);
            let parsed: BatchAnnotateFilesResponse = self
                .post("files:annotate", body)
                .await?
                .json()
                .await
                .map_err(|e| TimetableError::OcrFailed {
                    message: format!("Unreadable Cloud Vision response: {e}"),
                })?;
            text_from_files_response(parsed)
        } else {
            let body = json!({
                "requests": [{
                    "image": { "content": content },
                    "features": [{ "type": FEATURE }]
                }]
            });
            let parsed: BatchAnnotateImagesResponse = self
                .post("images:annotate", body)
                .await?
                .json()
                .await
                .map_err(|e| TimetableError::OcrFailed {
                    message: format!("Unreadable Cloud Vision response: {e}"),
                })?;
            text_from_images_response(parsed)
        }
    }
}

/// `files:annotate` body. `pages` is only sent when fewer than the API's
/// default of five are wanted.
fn files_request_body(content: String, mime_type: &str, max_pages: u32) -> Value {
    let mut request = json!({
        "inputConfig": { "content": content, "mimeType": mime_type },
        "features": [{ "type": FEATURE }]
    });
    if max_pages < API_DEFAULT_PAGES {
        request["pages"] = json!((1..=max_pages).collect::<Vec<u32>>());
    }
    json!({ "requests": [request] })
}

// ── Response types ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchAnnotateImagesResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchAnnotateFilesResponse {
    #[serde(default)]
    responses: Vec<AnnotateFileResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateFileResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
    error: Option<VisionStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<VisionStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct VisionStatus {
    code: Option<i32>,
    #[serde(default)]
    message: String,
}

impl VisionStatus {
    fn into_error(self) -> TimetableError {
        TimetableError::OcrFailed {
            message: match self.code {
                Some(code) => format!("Cloud Vision error {code}: {}", self.message),
                None => format!("Cloud Vision error: {}", self.message),
            },
        }
    }
}

fn page_text(page: AnnotateImageResponse) -> Result<String, TimetableError> {
    if let Some(status) = page.error {
        return Err(status.into_error());
    }
    Ok(page.full_text_annotation.map(|a| a.text).unwrap_or_default())
}

fn text_from_images_response(resp: BatchAnnotateImagesResponse) -> Result<String, TimetableError> {
    match resp.responses.into_iter().next() {
        Some(page) => page_text(page),
        None => Ok(String::new()),
    }
}

fn text_from_files_response(resp: BatchAnnotateFilesResponse) -> Result<String, TimetableError> {
    let Some(file) = resp.responses.into_iter().next() else {
        return Ok(String::new());
    };
    if let Some(status) = file.error {
        return Err(status.into_error());
    }
    let pages = file
        .responses
        .into_iter()
        .map(page_text)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pages
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}
