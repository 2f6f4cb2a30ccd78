//! External collaborators: OCR and generative-model providers.
//!
//! The pipeline only ever talks to the two traits defined here, so the HTTP
//! handler can be built with real cloud clients in production and with
//! in-memory fakes in tests.
//!
//! | Trait | Production implementation |
//! |-------|---------------------------|
//! | [`TextRecognizer`] | [`vision::CloudVisionRecognizer`] (Google Cloud Vision) |
//! | [`GenerativeModel`] | [`vertex::VertexGenerativeModel`] (Vertex AI Gemini) or [`llm::LlmProviderModel`] (any edgequake-llm provider) |
//!
//! The request/response types mirror the Gemini `generateContent` wire
//! format; non-Gemini backends are adapted into it.

pub mod auth;
pub mod llm;
pub mod vertex;
pub mod vision;

use crate::config::ServiceConfig;
use crate::error::TimetableError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Turns a stored document into plain text.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Full-text transcription of the file at `path`.
    ///
    /// Returns `Ok(String::new())` when the provider found no text; transport,
    /// auth and provider-side failures are `Err`.
    async fn recognize(&self, path: &Path, mime_type: &str) -> Result<String, TimetableError>;
}

/// Produces completions for a prompt.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Single-turn completion. Output text is untrusted: callers must parse
    /// it defensively.
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, TimetableError>;

    /// Human-readable backend name for logs.
    fn describe(&self) -> String;
}

// ── Wire types ───────────────────────────────────────────────────────────

/// Sampling settings for a completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: usize,
}

/// One text segment of a message or candidate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

/// A message: role plus ordered parts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Body of a `generateContent` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    /// A single user turn carrying `prompt`.
    pub fn user_prompt(prompt: impl Into<String>, generation_config: GenerationConfig) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(prompt)],
            }],
            generation_config,
        }
    }

    /// Concatenated text of every user part.
    pub fn prompt_text(&self) -> String {
        self.contents
            .iter()
            .filter(|c| c.role.as_deref().unwrap_or("user") == "user")
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect()
    }
}

/// One alternative completion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

/// Reply of a `generateContent` call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// A reply holding one candidate with one text part.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts: vec![Part::text(text)],
                }),
                finish_reason: Some("STOP".to_string()),
            }],
            usage_metadata: None,
        }
    }
}

// ── Construction ─────────────────────────────────────────────────────────

/// Shared HTTP client for the Google adapters.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, TimetableError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TimetableError::InvalidConfig(format!("HTTP client: {e}")))
}

/// Build the production collaborators described by `config`.
///
/// Called once at startup; the returned handles are shared by every request.
pub fn build_collaborators(
    config: &ServiceConfig,
) -> Result<(Arc<dyn TextRecognizer>, Arc<dyn GenerativeModel>), TimetableError> {
    let client = http_client(config.api_timeout_secs)?;
    let auth = auth::GoogleAuth::from_config(config);

    let recognizer: Arc<dyn TextRecognizer> = Arc::new(vision::CloudVisionRecognizer::new(
        client.clone(),
        auth.clone(),
        config.ocr_pdf_max_pages,
    ));

    let model: Arc<dyn GenerativeModel> = match config.llm_provider.as_deref() {
        Some(name) if !name.trim().is_empty() => Arc::new(llm::LlmProviderModel::from_config(
            name,
            config.llm_model.as_deref(),
        )?),
        _ => {
            if config.project_id.is_none() {
                warn!("GCP_PROJECT_ID not set; Vertex AI requests will fail until it is defined");
            }
            Arc::new(vertex::VertexGenerativeModel::new(
                client,
                auth,
                config.project_id.clone(),
                &config.location,
                &config.model,
            ))
        }
    };

    info!("Generative backend: {}", model.describe());
    Ok((recognizer, model))
}
