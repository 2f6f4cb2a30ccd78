//! Vertex AI Gemini adapter (`generateContent` REST endpoint).

use super::auth::GoogleAuth;
use super::{GenerateContentRequest, GenerateContentResponse, GenerativeModel};
use crate::error::TimetableError;
use async_trait::async_trait;
use tracing::debug;

/// Generative model served by Vertex AI.
pub struct VertexGenerativeModel {
    client: reqwest::Client,
    auth: GoogleAuth,
    project_id: Option<String>,
    location: String,
    model: String,
    base_url: Option<String>,
}

impl VertexGenerativeModel {
    pub fn new(
        client: reqwest::Client,
        auth: GoogleAuth,
        project_id: Option<String>,
        location: &str,
        model: &str,
    ) -> Self {
        Self {
            client,
            auth,
            project_id,
            location: location.to_string(),
            model: model.to_string(),
            base_url: None,
        }
    }

    /// Override the API root (`https://{location}-aiplatform.googleapis.com` by default).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn endpoint(&self) -> Result<String, TimetableError> {
        let project = self
            .project_id
            .as_deref()
            .ok_or_else(|| TimetableError::GenerationFailed {
                message: "GCP project id is not configured (set GCP_PROJECT_ID)".to_string(),
            })?;
        let base = match &self.base_url {
            Some(url) => url.clone(),
            None if self.location == "global" => "https://aiplatform.googleapis.com".to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        };
        Ok(format!(
            "{base}/v1/projects/{project}/locations/{}/publishers/google/models/{}:generateContent",
            self.location, self.model
        ))
    }
}

#[async_trait]
impl GenerativeModel for VertexGenerativeModel {
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, TimetableError> {
        let url = self.endpoint()?;
        debug!("POST {}", url);

        let builder = self.auth.authorize(&self.client, self.client.post(&url)).await?;
        let response = builder
            .json(request)
            .send()
            .await
            .map_err(|e| TimetableError::GenerationFailed {
                message: format!("Failed to reach Vertex AI: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TimetableError::GenerationFailed {
                message: format!("Vertex AI request failed: {status} - {error_text}"),
            });
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| TimetableError::GenerationFailed {
                message: format!("Unreadable Vertex AI response: {e}"),
            })
    }

    fn describe(&self) -> String {
        format!("vertex-ai/{} ({})", self.model, self.location)
    }
}
