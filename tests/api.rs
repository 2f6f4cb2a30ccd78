//! HTTP-level tests for the upload endpoint.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; OCR and
//! the generative model are replaced by in-memory fakes that count their calls,
//! so these tests need no network and no credentials.
//!
//! Run with:
//!   cargo test --test api

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use timetable_ocr::{
    router, AppState, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    GenerativeModel, TextRecognizer, TimetableError, TimetableHandler, UploadLimits,
    LIVENESS_MESSAGE,
};
use tower::ServiceExt; // for oneshot

// ── Fakes ────────────────────────────────────────────────────────────────────

const OCR_TEXT: &str = "Mon 08:55-10:10 Maths Room 4 Mr Smith";

const MATHS_REPLY: &str = r#"{"blocks":[{"dayOfWeek":"Mon","startTime":"08:55","endTime":"10:10","subject":"Maths","room":"Room 4","teacher":"Mr Smith"}]}"#;

#[derive(Default)]
struct FakeOcr {
    calls: AtomicUsize,
    /// Path seen by the last call and whether it existed at that moment.
    seen: Mutex<Option<(PathBuf, bool)>>,
}

#[async_trait]
impl TextRecognizer for FakeOcr {
    async fn recognize(&self, path: &Path, _mime_type: &str) -> Result<String, TimetableError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock().unwrap() = Some((path.to_path_buf(), path.exists()));
        Ok(OCR_TEXT.to_string())
    }
}

struct FakeModel {
    reply: String,
    calls: AtomicUsize,
    prompt: Mutex<Option<String>>,
}

impl FakeModel {
    fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            prompt: Mutex::new(None),
        }
    }
}

#[async_trait]
impl GenerativeModel for FakeModel {
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, TimetableError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.prompt.lock().unwrap() = Some(request.prompt_text());
        Ok(GenerateContentResponse::from_text(self.reply.clone()))
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

struct Harness {
    app: Router,
    ocr: Arc<FakeOcr>,
    model: Arc<FakeModel>,
    upload_dir: PathBuf,
    _dir: TempDir,
}

impl Harness {
    fn new(reply: &str) -> Self {
        Self::with_limit(reply, 1024 * 1024)
    }

    fn with_limit(reply: &str, max_bytes: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let upload_dir = dir.path().join("uploads");
        let ocr = Arc::new(FakeOcr::default());
        let model = Arc::new(FakeModel::replying(reply));
        let handler = TimetableHandler::new(
            ocr.clone(),
            model.clone(),
            GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 2048,
            },
        );
        let state = AppState::new(
            handler,
            UploadLimits {
                upload_dir: upload_dir.clone(),
                max_bytes,
            },
        );
        Self {
            app: router(state),
            ocr,
            model,
            upload_dir,
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn upload(&self, parts: &[FormPart<'_>]) -> (StatusCode, Value) {
        let (status, body) = self.send(multipart_request(parts)).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn ocr_calls(&self) -> usize {
        self.ocr.calls.load(Ordering::SeqCst)
    }

    fn model_calls(&self) -> usize {
        self.model.calls.load(Ordering::SeqCst)
    }

    /// True when nothing is left behind in the upload directory.
    fn upload_dir_is_clean(&self) -> bool {
        match std::fs::read_dir(&self.upload_dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

// ── Multipart builder ────────────────────────────────────────────────────────

const BOUNDARY: &str = "timetable-test-boundary";

struct FormPart<'a> {
    name: &'a str,
    file_name: Option<&'a str>,
    content_type: Option<&'a str>,
    data: &'a [u8],
}

fn file_part<'a>(file_name: &'a str, content_type: &'a str, data: &'a [u8]) -> FormPart<'a> {
    FormPart {
        name: "file",
        file_name: Some(file_name),
        content_type: Some(content_type),
        data,
    }
}

fn multipart_request(parts: &[FormPart<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(f) = part.file_name {
            disposition.push_str(&format!("; filename=\"{f}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(ct) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload-timetable")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake image data";

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_liveness() {
    let h = Harness::new(MATHS_REPLY);
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = h.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), LIVENESS_MESSAGE);
}

#[tokio::test]
async fn test_png_upload_end_to_end() {
    let h = Harness::new(MATHS_REPLY);
    let (status, body) = h
        .upload(&[file_part("week.png", "image/png", PNG_BYTES)])
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(
        body,
        json!({
            "fileName": "week.png",
            "mimeType": "image/png",
            "blocks": [{
                "dayOfWeek": "Mon",
                "startTime": "08:55",
                "endTime": "10:10",
                "subject": "Maths",
                "room": "Room 4",
                "teacher": "Mr Smith"
            }]
        })
    );
    assert_eq!(h.ocr_calls(), 1);
    assert_eq!(h.model_calls(), 1);
}

#[tokio::test]
async fn test_staged_file_exists_during_ocr_and_is_removed_after() {
    let h = Harness::new(MATHS_REPLY);
    let (status, _) = h
        .upload(&[file_part("week.pdf", "application/pdf", b"%PDF-1.4 fake")])
        .await;
    assert_eq!(status, StatusCode::OK);

    let (path, existed) = h.ocr.seen.lock().unwrap().clone().unwrap();
    assert!(existed, "OCR must see the staged file");
    assert!(path.starts_with(&h.upload_dir));
    assert!(!path.exists(), "staged file must be deleted after the request");
    assert!(h.upload_dir_is_clean());
}

#[tokio::test]
async fn test_prompt_embeds_ocr_text() {
    let h = Harness::new(MATHS_REPLY);
    h.upload(&[file_part("week.jpg", "image/jpeg", PNG_BYTES)])
        .await;

    let prompt = h.model.prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains(OCR_TEXT));
    assert!(prompt.contains("\"blocks\""));
}

#[tokio::test]
async fn test_fenced_reply_is_parsed() {
    let fenced = format!("```json\n{MATHS_REPLY}\n```");
    let h = Harness::new(&fenced);
    let (status, body) = h
        .upload(&[file_part("week.png", "image/png", PNG_BYTES)])
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["blocks"][0]["subject"], "Maths");
}

#[tokio::test]
async fn test_invalid_json_is_500_and_cleans_up() {
    let h = Harness::new("Sure! Here is the timetable: Maths on Monday.");
    let (status, body) = h
        .upload(&[file_part("week.png", "image/png", PNG_BYTES)])
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to process file");
    assert!(body["details"].as_str().unwrap().contains("invalid JSON"));
    assert!(h.upload_dir_is_clean());
}

#[tokio::test]
async fn test_missing_blocks_is_500() {
    let h = Harness::new(r#"{"timetable": []}"#);
    let (status, body) = h
        .upload(&[file_part("week.png", "image/png", PNG_BYTES)])
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["details"].as_str().unwrap().contains("missing 'blocks'"));
    assert!(h.upload_dir_is_clean());
}

#[tokio::test]
async fn test_empty_candidate_is_500() {
    let h = Harness::new("");
    let (status, body) = h
        .upload(&[file_part("week.png", "image/png", PNG_BYTES)])
        .await;

    // An empty reply trims to "", which is not JSON.
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to process file");
}

#[tokio::test]
async fn test_unsupported_type_rejected_before_remote_calls() {
    let h = Harness::new(MATHS_REPLY);
    let (status, body) = h
        .upload(&[file_part("notes.txt", "text/plain", b"Mon Maths")])
        .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(body["details"].as_str().unwrap().contains("text/plain"));
    assert_eq!(h.ocr_calls(), 0);
    assert_eq!(h.model_calls(), 0);
    assert!(h.upload_dir_is_clean());
}

#[tokio::test]
async fn test_oversized_file_is_413() {
    let h = Harness::with_limit(MATHS_REPLY, 16);
    let big = vec![0u8; 100];
    let (status, body) = h
        .upload(&[file_part("week.png", "image/png", &big)])
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "File too large");
    assert_eq!(h.ocr_calls(), 0);
    assert_eq!(h.model_calls(), 0);
    assert!(h.upload_dir_is_clean());
}

#[tokio::test]
async fn test_file_without_content_type_is_rejected() {
    let h = Harness::new(MATHS_REPLY);
    let (status, body) = h
        .upload(&[FormPart {
            name: "file",
            file_name: Some("week.png"),
            content_type: None,
            data: PNG_BYTES,
        }])
        .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("application/octet-stream"));
    assert_eq!(h.ocr_calls(), 0);
    assert_eq!(h.model_calls(), 0);
    assert!(h.upload_dir_is_clean());
}

#[tokio::test]
async fn test_file_without_name_is_called_upload() {
    let h = Harness::new(MATHS_REPLY);
    let (status, body) = h
        .upload(&[FormPart {
            name: "file",
            file_name: None,
            content_type: Some("image/png"),
            data: PNG_BYTES,
        }])
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["fileName"], "upload");
    assert_eq!(body["mimeType"], "image/png");
}

#[tokio::test]
async fn test_body_over_request_limit_is_413() {
    // Larger than the file ceiling plus multipart headroom, so the request
    // body limit trips before the staging size check.
    let h = Harness::with_limit(MATHS_REPLY, 16);
    let huge = vec![0u8; 200 * 1024];
    let (status, body) = h
        .upload(&[file_part("week.png", "image/png", &huge)])
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "File too large");
    assert!(body["details"].as_str().unwrap().contains("16 byte"));
    assert_eq!(h.ocr_calls(), 0);
    assert!(h.upload_dir_is_clean());
}

#[tokio::test]
async fn test_missing_file_field_is_400() {
    let h = Harness::new(MATHS_REPLY);
    let (status, body) = h
        .upload(&[FormPart {
            name: "comment",
            file_name: None,
            content_type: None,
            data: b"no file here",
        }])
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No file uploaded"}));
    assert_eq!(h.ocr_calls(), 0);
}

#[tokio::test]
async fn test_non_multipart_body_is_400() {
    let h = Harness::new(MATHS_REPLY);
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload-timetable")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"file": "week.png"}"#))
        .unwrap();
    let (status, body) = h.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn test_other_fields_are_skipped() {
    let h = Harness::new(MATHS_REPLY);
    let (status, body) = h
        .upload(&[
            FormPart {
                name: "comment",
                file_name: None,
                content_type: None,
                data: b"term 1",
            },
            file_part("week.png", "image/png", PNG_BYTES),
        ])
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["fileName"], "week.png");
}

#[tokio::test]
async fn test_identical_requests_give_identical_bodies() {
    let h = Harness::new(MATHS_REPLY);
    let parts = [file_part("week.png", "image/png", PNG_BYTES)];

    let (s1, b1) = h.send(multipart_request(&parts)).await;
    let (s2, b2) = h.send(multipart_request(&parts)).await;

    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(b1, b2);
    assert_eq!(h.ocr_calls(), 2);
    assert!(h.upload_dir_is_clean());
}
