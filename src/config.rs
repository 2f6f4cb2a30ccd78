//! Configuration for the timetable service.
//!
//! Everything the service needs at startup lives in [`ServiceConfig`], built
//! via [`ServiceConfigBuilder`]. The binary maps CLI flags and environment
//! variables onto the builder; library users and tests set only the fields
//! they care about and take the defaults for the rest.

use crate::error::TimetableError;
use crate::providers::GenerationConfig;
use std::fmt;
use std::path::PathBuf;

/// Largest accepted upload, in bytes (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Configuration for the timetable service.
///
/// # Example
/// ```rust
/// use timetable_ocr::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .port(8080)
///     .project_id("my-gcp-project")
///     .build()
///     .unwrap();
/// assert_eq!(config.location, "us-central1");
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Bind address. Default: `0.0.0.0`.
    pub host: String,

    /// Service port. Default: 4000.
    pub port: u16,

    /// Google Cloud project hosting the Vertex AI model.
    ///
    /// Missing is tolerated at startup (a warning is logged); Vertex calls
    /// then fail per request.
    pub project_id: Option<String>,

    /// Vertex AI region. Default: `us-central1`.
    pub location: String,

    /// Vertex AI model id. Default: `gemini-1.5-flash`.
    pub model: String,

    /// edgequake-llm provider name (e.g. "openai", "gemini", "ollama").
    /// When set, it replaces Vertex AI as the generative backend.
    pub llm_provider: Option<String>,

    /// Model id for `llm_provider`. If None, the provider's default is used.
    pub llm_model: Option<String>,

    /// Google API key. Takes precedence over `access_token`.
    pub api_key: Option<String>,

    /// Pre-minted OAuth access token. If neither this nor `api_key` is set,
    /// tokens come from the GCE metadata server.
    pub access_token: Option<String>,

    /// Directory where uploads are staged while a request runs. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Upload size ceiling in bytes. Default: 20 MiB.
    pub max_upload_bytes: u64,

    /// Sampling temperature for the extraction completion. Default: 0.1.
    ///
    /// Extraction wants the model to copy what is in the text, not to be
    /// inventive, so this stays close to zero.
    pub temperature: f32,

    /// Completion length ceiling in tokens. Default: 2048.
    pub max_output_tokens: usize,

    /// Timeout applied to every provider HTTP call, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Number of leading PDF pages sent to OCR. Default: 5 (the synchronous
    /// `files:annotate` maximum).
    pub ocr_pdf_max_pages: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            project_id: None,
            location: "us-central1".to_string(),
            model: "gemini-1.5-flash".to_string(),
            llm_provider: None,
            llm_model: None,
            api_key: None,
            access_token: None,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            temperature: 0.1,
            max_output_tokens: 2048,
            api_timeout_secs: 60,
            ocr_pdf_max_pages: 5,
        }
    }
}

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("model", &self.model)
            .field("llm_provider", &self.llm_provider)
            .field("llm_model", &self.llm_model)
            .field("api_key", &redact(&self.api_key))
            .field("access_token", &redact(&self.access_token))
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("ocr_pdf_max_pages", &self.ocr_pdf_max_pages)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// `host:port` string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sampling settings sent with every extraction request.
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn project_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.config.project_id = if id.trim().is_empty() { None } else { Some(id) };
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.config.location = location.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn llm_provider(mut self, name: impl Into<String>) -> Self {
        self.config.llm_provider = Some(name.into());
        self
    }

    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm_model = Some(model.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: u64) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn ocr_pdf_max_pages(mut self, n: u32) -> Self {
        self.config.ocr_pdf_max_pages = n.clamp(1, 5);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, TimetableError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(TimetableError::InvalidConfig(
                "Upload limit must be > 0 bytes".into(),
            ));
        }
        if c.max_output_tokens == 0 {
            return Err(TimetableError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if c.location.trim().is_empty() {
            return Err(TimetableError::InvalidConfig(
                "Vertex AI location must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
