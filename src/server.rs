//! HTTP surface: liveness and the upload endpoint.
//!
//! | Route | Method | Response |
//! |-------|--------|----------|
//! | `/` | GET | plain-text liveness string |
//! | `/api/upload-timetable` | POST | multipart `file` → [`TimetableResult`] JSON |
//!
//! Errors are JSON `{"error": ..., "details": ...}`. Input rejections get a
//! 4xx status; everything that goes wrong after the file was accepted is a
//! 500 with the generic message `"Failed to process file"`.

use crate::config::ServiceConfig;
use crate::error::TimetableError;
use crate::handler::{log_failure, RequestStage, TimetableHandler};
use crate::output::TimetableResult;
use crate::pipeline::upload::{receive_upload, UploadLimits};
use crate::providers::build_collaborators;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Body of `GET /`.
pub const LIVENESS_MESSAGE: &str = "Timetable OCR + Vertex AI backend is running.";

/// Headroom over the file ceiling for multipart boundaries and headers.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared state for every request.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<TimetableHandler>,
    pub limits: UploadLimits,
}

impl AppState {
    pub fn new(handler: TimetableHandler, limits: UploadLimits) -> Self {
        Self {
            handler: Arc::new(handler),
            limits,
        }
    }

    /// Build production collaborators from `config`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, TimetableError> {
        let (recognizer, model) = build_collaborators(config)?;
        Ok(Self::new(
            TimetableHandler::new(recognizer, model, config.generation_config()),
            UploadLimits {
                upload_dir: config.upload_dir.clone(),
                max_bytes: config.max_upload_bytes,
            },
        ))
    }
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// HTTP mapping of [`TimetableError`].
#[derive(Debug)]
pub struct ApiError(pub TimetableError);

impl From<TimetableError> for ApiError {
    fn from(e: TimetableError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let details = Some(self.0.to_string());
        if !self.0.is_client_error() {
            let body = ErrorResponse {
                error: "Failed to process file".to_string(),
                details,
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        }

        let (status, error, details) = match self.0 {
            TimetableError::MissingFile => (StatusCode::BAD_REQUEST, "No file uploaded", None),
            TimetableError::UnsupportedType { .. } => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Unsupported file type",
                details,
            ),
            TimetableError::FileTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "File too large", details)
            }
            _ => (StatusCode::BAD_REQUEST, "Malformed upload", details),
        };
        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.limits.max_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(liveness))
        .route("/api/upload-timetable", post(upload_timetable))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn liveness() -> &'static str {
    LIVENESS_MESSAGE
}

async fn upload_timetable(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TimetableResult>, ApiError> {
    // A body that is not multipart at all carries no file either.
    let Ok(mut multipart) = multipart else {
        log_failure(RequestStage::Received, &TimetableError::MissingFile);
        return Err(TimetableError::MissingFile.into());
    };

    let upload = receive_upload(&mut multipart, &state.limits)
        .await
        .map_err(|e| {
            log_failure(RequestStage::Received, &e);
            e
        })?;

    let result = state.handler.process_upload(upload).await?;
    Ok(Json(result))
}

/// Bind `config.bind_addr()` and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: &ServiceConfig, state: AppState) -> std::io::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        addr = %addr,
        upload_dir = %config.upload_dir.display(),
        max_upload_mb = config.max_upload_bytes / 1024 / 1024,
        "Server ready and accepting connections"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
    info!("Shutting down gracefully...");
}
