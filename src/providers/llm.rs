//! edgequake-llm adapter: any chat provider as a [`GenerativeModel`].
//!
//! Chat providers return one completion, not a list of candidates. The reply
//! is exposed as a single candidate with a single text part; an empty reply
//! becomes a candidate with no parts so the extraction step reports it as
//! "no candidate" exactly as it would for Vertex.

use super::{
    Candidate, Content, GenerateContentRequest, GenerateContentResponse, GenerativeModel, Part,
    UsageMetadata,
};
use crate::error::TimetableError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Model used when a provider is named without a model.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4.1-nano";

/// A [`GenerativeModel`] backed by an edgequake-llm provider.
pub struct LlmProviderModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmProviderModel {
    /// Wrap a pre-built provider.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Resolve a provider by name.
    ///
    /// `"auto"` scans the environment for any configured API key via
    /// [`ProviderFactory::from_env`]; any other name goes through
    /// [`ProviderFactory::create_llm_provider`], which reads that provider's
    /// key (`OPENAI_API_KEY`, `GEMINI_API_KEY`, …).
    pub fn from_config(name: &str, model: Option<&str>) -> Result<Self, TimetableError> {
        if name == "auto" {
            let (provider, _embedding) =
                ProviderFactory::from_env().map_err(|e| TimetableError::ProviderNotConfigured {
                    provider: "auto".to_string(),
                    hint: format!(
                        "No LLM provider could be auto-detected from environment.\n\
                        Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or GEMINI_API_KEY.\n\
                        Error: {e}"
                    ),
                })?;
            return Ok(Self::new(provider, "edgequake-llm/auto"));
        }

        let model = model.unwrap_or(DEFAULT_LLM_MODEL);
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            TimetableError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, format!("edgequake-llm/{name}/{model}")))
    }
}

/// Wrap one chat completion as a single-candidate reply.
fn response_from_chat(
    content: String,
    prompt_tokens: usize,
    completion_tokens: usize,
) -> GenerateContentResponse {
    let parts = if content.is_empty() {
        Vec::new()
    } else {
        vec![Part::text(content)]
    };

    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content {
                role: Some("model".to_string()),
                parts,
            }),
            finish_reason: None,
        }],
        usage_metadata: Some(UsageMetadata {
            prompt_token_count: u32::try_from(prompt_tokens).unwrap_or(u32::MAX),
            candidates_token_count: u32::try_from(completion_tokens).unwrap_or(u32::MAX),
        }),
    }
}

#[async_trait]
impl GenerativeModel for LlmProviderModel {
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, TimetableError> {
        let messages = vec![ChatMessage::user(request.prompt_text())];
        let options = CompletionOptions {
            temperature: Some(request.generation_config.temperature),
            max_tokens: Some(request.generation_config.max_output_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| TimetableError::GenerationFailed {
                message: format!("{}: {e}", self.label),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        Ok(response_from_chat(
            response.content,
            response.prompt_tokens,
            response.completion_tokens,
        ))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
